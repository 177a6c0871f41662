//! Name patterns
//!
//! A pattern is literal text with bracketed fields:
//!
//! | Field | Result |
//! |-------|--------|
//! | `[layer name]` | working name of the item |
//! | `[image name]` | name of the image |
//! | `[layer path]`, `[layer path, _]` | parent names and the item name joined by `-` (or the given separator) |
//! | `[1]`, `[001]` | counter starting at the given value, zero-padded to the given width |
//!
//! Unknown fields are kept as written.

use crate::domain::{BatcherError, Result};
use regex::Regex;

const DEFAULT_PATH_SEPARATOR: &str = "-";

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Text(String),
    LayerName,
    ImageName,
    LayerPath { separator: String },
    Number { next: u64, width: usize },
}

/// Values fields are resolved from
#[derive(Debug, Clone, Copy)]
pub struct RenameInput<'a> {
    pub layer_name: &'a str,
    pub image_name: &'a str,
    /// Names of the parents, outermost first
    pub parent_names: &'a [String],
}

/// Compiled name pattern
///
/// Counters advance once per [`Renamer::rename`] call.
///
/// # Examples
///
/// ```
/// use batcher::core::renamer::{RenameInput, Renamer};
///
/// let mut renamer = Renamer::new("[image name]_[001]")?;
/// let input = RenameInput { layer_name: "Sky", image_name: "scene", parent_names: &[] };
/// assert_eq!(renamer.rename(&input), "scene_001");
/// assert_eq!(renamer.rename(&input), "scene_002");
/// # Ok::<(), batcher::domain::BatcherError>(())
/// ```
#[derive(Debug, Clone)]
pub struct Renamer {
    tokens: Vec<Token>,
}

impl Renamer {
    /// Compiles `pattern`; an empty pattern means `[layer name]`
    pub fn new(pattern: &str) -> Result<Self> {
        if pattern.is_empty() {
            return Ok(Self {
                tokens: vec![Token::LayerName],
            });
        }

        let field_re = Regex::new(r"\[([^\[\]]+)\]").map_err(|e| {
            BatcherError::Configuration(format!("Invalid name pattern regex: {e}"))
        })?;
        let mut tokens = Vec::new();
        let mut last = 0;

        for captures in field_re.captures_iter(pattern) {
            let (Some(whole), Some(body)) = (captures.get(0), captures.get(1)) else {
                continue;
            };
            if whole.start() > last {
                tokens.push(Token::Text(pattern[last..whole.start()].to_string()));
            }
            tokens.push(parse_field(body.as_str(), whole.as_str()));
            last = whole.end();
        }
        if last < pattern.len() {
            tokens.push(Token::Text(pattern[last..].to_string()));
        }

        Ok(Self { tokens })
    }

    /// Produces the next name
    pub fn rename(&mut self, input: &RenameInput<'_>) -> String {
        let mut name = String::new();
        for token in &mut self.tokens {
            match token {
                Token::Text(text) => name.push_str(text),
                Token::LayerName => name.push_str(input.layer_name),
                Token::ImageName => name.push_str(input.image_name),
                Token::LayerPath { separator } => {
                    let mut parts: Vec<&str> =
                        input.parent_names.iter().map(String::as_str).collect();
                    parts.push(input.layer_name);
                    name.push_str(&parts.join(separator.as_str()));
                }
                Token::Number { next, width } => {
                    name.push_str(&format!("{:0width$}", next, width = *width));
                    *next += 1;
                }
            }
        }
        name
    }
}

fn parse_field(body: &str, raw: &str) -> Token {
    let mut parts = body.split(',').map(str::trim);
    let name = parts.next().unwrap_or_default();
    let args: Vec<&str> = parts.collect();

    if !name.is_empty() && name.bytes().all(|b| b.is_ascii_digit()) {
        return match name.parse::<u64>() {
            Ok(start) => Token::Number {
                next: start,
                width: name.len(),
            },
            Err(_) => Token::Text(raw.to_string()),
        };
    }

    match name.to_lowercase().as_str() {
        "layer name" => Token::LayerName,
        "image name" => Token::ImageName,
        "layer path" => Token::LayerPath {
            separator: args
                .first()
                .map(|s| s.to_string())
                .unwrap_or_else(|| DEFAULT_PATH_SEPARATOR.to_string()),
        },
        _ => Token::Text(raw.to_string()),
    }
}
