//! The descriptor parser.

use pest::error::Error as PestError;
use pest::error::LineColLocation;
use pest::iterators::Pair;
use pest_derive::Parser;

use crate::error::Error;
use crate::int::parse_int;

#[derive(Parser)]
#[grammar = "desc/grammar.pest"]
struct PegParser;

/// A parsed value.
#[derive(Clone, PartialEq, Eq, Debug)]
pub enum Value {
  /// An integer literal.
  Int(u64),
  /// A quoted string, with escapes resolved.
  Str(String),
  /// `true` or `false`.
  Bool(bool),
  /// Anything else.
  Raw,
}

impl Value {
  /// Describes the type of this value, for error messages.
  pub fn describe(&self) -> &'static str {
    match self {
      Self::Int(_) => "an integer",
      Self::Str(_) => "a string",
      Self::Bool(_) => "a boolean",
      Self::Raw => "unquoted text",
    }
  }
}

/// A `key = value` line.
#[derive(Clone, Debug)]
pub struct Entry<'a> {
  pub key: &'a str,
  pub value: Value,
  /// The value exactly as written, quotes included.
  pub text: &'a str,
  pub line: usize,
}

/// A `[segment]` header and the entries after it.
#[derive(Clone, Debug)]
pub struct Block<'a> {
  pub line: usize,
  pub entries: Vec<Entry<'a>>,
}

fn unescape(chars: &str) -> String {
  let mut out = String::with_capacity(chars.len());
  let mut iter = chars.chars();
  while let Some(c) = iter.next() {
    if c != '\\' {
      out.push(c);
      continue;
    }
    match iter.next() {
      Some('n') => out.push('\n'),
      Some('t') => out.push('\t'),
      Some(c) => out.push(c),
      None => {}
    }
  }
  out
}

/// Quotes `s` so that it parses back to itself.
pub fn quote(s: &str) -> String {
  let mut out = String::with_capacity(s.len() + 2);
  out.push('"');
  for c in s.chars() {
    match c {
      '"' => out.push_str("\\\""),
      '\\' => out.push_str("\\\\"),
      '\n' => out.push_str("\\n"),
      '\t' => out.push_str("\\t"),
      c => out.push(c),
    }
  }
  out.push('"');
  out
}

fn line_of(pair: &Pair<'_, Rule>) -> usize {
  pair.as_span().start_pos().line_col().0
}

fn value_of<'a>(pair: Pair<'a, Rule>) -> (Value, &'a str) {
  match pair.as_rule() {
    Rule::Quoted => {
      let text = pair.as_str();
      let chars = pair.into_inner().as_str();
      (Value::Str(unescape(chars)), text)
    }
    _ => {
      let text = pair.as_str().trim();
      let value = match text {
        "true" => Value::Bool(true),
        "false" => Value::Bool(false),
        _ => parse_int(text).map_or(Value::Raw, Value::Int),
      };
      (value, text)
    }
  }
}

/// Finds the index of the block a syntax error occurred in, which is the
/// number of block headers before the offending line, less one.
fn block_at(src: &str, line: usize) -> usize {
  src
    .lines()
    .take(line.saturating_sub(1))
    .filter(|l| l.trim_start().starts_with('['))
    .count()
    .saturating_sub(1)
}

fn syntax_error(src: &str, e: PestError<Rule>) -> Error {
  let line = match e.line_col {
    LineColLocation::Pos((line, _)) => line,
    LineColLocation::Span((line, _), _) => line,
  };
  Error::DescriptorInvalid {
    block: block_at(src, line + 1),
    line,
    reason: "syntax error".into(),
  }
}

/// Parses `src` into blocks.
pub fn parse(src: &str) -> Result<Vec<Block<'_>>, Error> {
  use pest::Parser;
  let file = PegParser::parse(Rule::File, src)
    .map_err(|e| syntax_error(src, e))?
    .next()
    .map(Pair::into_inner);

  let mut blocks: Vec<Block<'_>> = Vec::new();
  for pair in file.into_iter().flatten() {
    let line = line_of(&pair);
    match pair.as_rule() {
      Rule::Header => {
        let name = pair.into_inner().as_str();
        if name != "segment" {
          return Err(Error::DescriptorInvalid {
            block: blocks.len(),
            line,
            reason: format!("unknown block type `{}`", name),
          });
        }
        blocks.push(Block {
          line,
          entries: Vec::new(),
        });
      }
      Rule::Pair => {
        let mut inner = pair.into_inner();
        let (key, value) = match (inner.next(), inner.next()) {
          (Some(key), Some(value)) => (key.as_str(), value),
          _ => continue,
        };
        let (value, text) = value_of(value);
        let block = blocks.last_mut().ok_or(Error::DescriptorInvalid {
          block: 0,
          line,
          reason: format!("`{}` appears before any [segment] header", key),
        })?;
        block.entries.push(Entry {
          key,
          value,
          text,
          line,
        });
      }
      _ => {}
    }
  }
  Ok(blocks)
}

#[cfg(test)]
mod test {
  use super::*;

  #[test]
  fn blocks() {
    let src = "# a comment\n\
               \n\
               [segment]\n\
               address = 0x000000C0 # trailing\n\
               label = \"title \\\"pal\\\" # not a comment\"\n\
               truncated = true\n\
               \t  odd-key = some text  \n\
               [segment]\n\
               address=$10";
    let blocks = parse(src).unwrap();
    assert_eq!(blocks.len(), 2);
    assert_eq!(blocks[0].line, 3);
    assert_eq!(blocks[1].line, 8);

    let entries = &blocks[0].entries;
    assert_eq!(entries.len(), 4);
    assert_eq!(entries[0].key, "address");
    assert_eq!(entries[0].value, Value::Int(0xc0));
    assert_eq!(entries[0].text, "0x000000C0");
    assert_eq!(entries[0].line, 4);
    assert_eq!(
      entries[1].value,
      Value::Str("title \"pal\" # not a comment".into())
    );
    assert_eq!(entries[1].text, "\"title \\\"pal\\\" # not a comment\"");
    assert_eq!(entries[2].value, Value::Bool(true));
    assert_eq!(entries[3].key, "odd-key");
    assert_eq!(entries[3].value, Value::Raw);
    assert_eq!(entries[3].text, "some text");

    assert_eq!(blocks[1].entries[0].value, Value::Int(0x10));
  }

  #[test]
  fn quoting() {
    for s in &["", "plain", "a \"b\" c", "back\\slash", "tab\tnew\nline"] {
      let src = format!("[segment]\nlabel = {}\n", quote(s));
      let blocks = parse(&src).unwrap();
      assert_eq!(blocks[0].entries[0].value, Value::Str(s.to_string()));
    }
  }

  #[test]
  fn errors() {
    assert!(parse("").unwrap().is_empty());

    assert!(matches!(
      parse("address = 1\n"),
      Err(Error::DescriptorInvalid { block: 0, line: 1, .. })
    ));
    assert!(matches!(
      parse("[segment]\n[palette]\n"),
      Err(Error::DescriptorInvalid { block: 1, line: 2, .. })
    ));
    assert!(matches!(
      parse("[segment]\na = 1\n[segment]\nb =\n"),
      Err(Error::DescriptorInvalid { block: 1, line: 4, .. })
    ));
    assert!(matches!(
      parse("[segment]\nlabel = \"x\" y\n"),
      Err(Error::DescriptorInvalid { block: 0, line: 2, .. })
    ));
  }
}
