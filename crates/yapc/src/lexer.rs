use crate::error::CompileError;
use logos::Logos;

#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"[ \t\r\n]+")]
#[logos(skip r"#[^\n]*")]
pub enum TokenKind {
    // Keywords
    #[token("if")]
    If,
    #[token("elif")]
    Elif,
    #[token("else")]
    Else,
    #[token("while")]
    While,
    #[token("for")]
    For,
    #[token("break")]
    Break,
    #[token("continue")]
    Continue,
    #[token("def")]
    Def,
    #[token("yeet")]
    Yeet,
    #[token("yap")]
    Yap,
    #[token("spill")]
    Spill,
    #[token("struct")]
    Struct,

    // Type names
    #[token("int")]
    IntTy,
    #[token("float")]
    FloatTy,
    #[token("bool")]
    BoolTy,
    #[token("string")]
    StringTy,
    #[token("void")]
    VoidTy,
    #[token("stack")]
    StackTy,
    #[token("queue")]
    QueueTy,
    #[token("hashmap")]
    HashmapTy,

    // Boolean sentinels
    #[token("nocap")]
    Nocap,
    #[token("cap")]
    Cap,

    // Word operators
    #[token("and")]
    And,
    #[token("or")]
    Or,
    #[token("not")]
    Not,

    // Literals
    #[regex(r"[0-9]+", |lex| lex.slice().parse::<i64>().ok())]
    IntLit(i64),
    #[regex(r"[0-9]+\.[0-9]+", |lex| lex.slice().parse::<f64>().ok())]
    FloatLit(f64),
    #[regex(r#""[^"\n]*""#, |lex| {
        let s = lex.slice();
        Some(s[1..s.len()-1].to_string())
    })]
    StringLit(String),

    // Identifiers
    #[regex(r"[a-zA-Z_][a-zA-Z0-9_]*", |lex| lex.slice().to_string(), priority = 1)]
    Ident(String),

    // Operators
    #[token("+")]
    Plus,
    #[token("-")]
    Minus,
    #[token("*")]
    Star,
    #[token("/")]
    Slash,
    #[token("//")]
    SlashSlash,
    #[token("%")]
    Percent,
    #[token("^")]
    Caret,
    #[token("~")]
    Tilde,
    #[token("~~")]
    TildeTilde,
    #[token("&")]
    Amp,
    #[token("|")]
    Pipe,
    #[token("<")]
    Lt,
    #[token("<=")]
    LtEq,
    #[token(">")]
    Gt,
    #[token(">=")]
    GtEq,
    #[token("==")]
    EqEq,
    #[token("!=")]
    BangEq,
    #[token("=")]
    Eq,
    #[token("->")]
    Arrow,

    // Delimiters
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token("{")]
    LBrace,
    #[token("}")]
    RBrace,
    #[token("[")]
    LBracket,
    #[token("]")]
    RBracket,

    // Punctuation
    #[token(",")]
    Comma,
    #[token(";")]
    Semi,
    #[token(".")]
    Dot,
}

#[derive(Debug, Clone)]
pub struct Token {
    pub kind: TokenKind,
    pub line: usize,
}

pub fn lex(source: &str) -> Result<Vec<Token>, CompileError> {
    let mut tokens = Vec::new();
    let mut line = 1usize;
    let mut scanned = 0usize;

    let mut lexer = TokenKind::lexer(source);

    while let Some(result) = lexer.next() {
        let span = lexer.span();

        // Track the source line from the text skipped since the last token
        for ch in source[scanned..span.start].chars() {
            if ch == '\n' {
                line += 1;
            }
        }
        scanned = span.start;

        match result {
            Ok(kind) => tokens.push(Token { kind, line }),
            Err(_) => {
                return Err(CompileError::Lexer {
                    line,
                    msg: format!("unexpected character: {:?}", &source[span.start..span.end]),
                });
            }
        }
    }

    Ok(tokens)
}
