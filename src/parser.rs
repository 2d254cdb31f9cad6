use std::path::PathBuf;

use crate::error::ParseError;
use crate::pipeline::{Pipeline, Stage};

/// A lexical unit of a command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    Word(String),
    Pipe,
    Input,
    Output,
    Background,
}

/// States for the tokenizer state machine.
enum State {
    /// Between tokens — whitespace is skipped
    Normal,
    /// Building a word — whitespace or an operator ends it
    InWord,
    /// Inside double quotes — whitespace and operators are literal
    InDoubleQuote,
    /// Inside single quotes — everything is literal
    InSingleQuote,
}

fn operator(ch: char) -> Token {
    match ch {
        '|' => Token::Pipe,
        '<' => Token::Input,
        '>' => Token::Output,
        _ => Token::Background,
    }
}

/// Split a line into words and operators, resolving quotes and escapes.
///
/// Unquoted `|`, `<`, `>` and `&` are operators even when glued to a word.
pub fn tokenize(input: &str) -> Result<Vec<Token>, ParseError> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut state = State::Normal;
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        match (&state, ch) {
            (State::Normal, ' ' | '\t' | '\r' | '\n') => {}
            (State::InWord, ' ' | '\t' | '\r' | '\n') => {
                tokens.push(Token::Word(std::mem::take(&mut current)));
                state = State::Normal;
            }
            (State::Normal | State::InWord, '|' | '<' | '>' | '&') => {
                if matches!(state, State::InWord) {
                    tokens.push(Token::Word(std::mem::take(&mut current)));
                }
                tokens.push(operator(ch));
                state = State::Normal;
            }
            (State::Normal | State::InWord, '"') => state = State::InDoubleQuote,
            (State::Normal | State::InWord, '\'') => state = State::InSingleQuote,
            (State::Normal | State::InWord, '\\') => {
                // A trailing backslash stands for itself.
                current.push(chars.next().unwrap_or('\\'));
                state = State::InWord;
            }
            (State::Normal | State::InWord, c) => {
                current.push(c);
                state = State::InWord;
            }

            (State::InDoubleQuote, '"') => state = State::InWord,
            (State::InDoubleQuote, '\\') => match chars.peek() {
                Some(&next @ ('"' | '\\' | '$' | '`')) => {
                    current.push(next);
                    chars.next();
                }
                _ => current.push('\\'),
            },
            (State::InDoubleQuote, c) => current.push(c),

            (State::InSingleQuote, '\'') => state = State::InWord,
            (State::InSingleQuote, c) => current.push(c),
        }
    }

    match state {
        State::InWord => tokens.push(Token::Word(current)),
        State::InDoubleQuote | State::InSingleQuote => return Err(ParseError::UnterminatedQuote),
        State::Normal => {}
    }

    Ok(tokens)
}

/// Parse one line into a pipeline. A blank line yields `Ok(None)`.
pub fn parse(line: &str) -> Result<Option<Pipeline>, ParseError> {
    let tokens = tokenize(line)?;
    if tokens.is_empty() {
        return Ok(None);
    }

    let mut stages = Vec::new();
    let mut current: Vec<String> = Vec::new();
    let mut input: Option<PathBuf> = None;
    let mut output: Option<PathBuf> = None;
    let mut background = false;
    let mut tokens = tokens.into_iter();

    while let Some(token) = tokens.next() {
        if background {
            return Err(ParseError::MisplacedAmpersand);
        }
        match token {
            Token::Word(word) => current.push(word),
            Token::Pipe => {
                let stage = Stage::new(std::mem::take(&mut current)).ok_or(ParseError::MisplacedPipe)?;
                stages.push(stage);
            }
            Token::Input => {
                let Some(Token::Word(path)) = tokens.next() else {
                    return Err(ParseError::MissingInputFile);
                };
                if input.replace(PathBuf::from(path)).is_some() {
                    return Err(ParseError::DuplicateInput);
                }
            }
            Token::Output => {
                let Some(Token::Word(path)) = tokens.next() else {
                    return Err(ParseError::MissingOutputFile);
                };
                if output.replace(PathBuf::from(path)).is_some() {
                    return Err(ParseError::DuplicateOutput);
                }
            }
            Token::Background => background = true,
        }
    }

    match Stage::new(current) {
        Some(stage) => stages.push(stage),
        None if !stages.is_empty() => return Err(ParseError::MisplacedPipe),
        None if input.is_some() || output.is_some() => {
            return Err(ParseError::RedirectionWithoutCommand);
        }
        None => return Err(ParseError::MisplacedAmpersand),
    }

    Ok(Some(Pipeline {
        stages,
        input,
        output,
        background,
    }))
}
