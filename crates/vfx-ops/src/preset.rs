//! The `.bs` textual preset grammar: a nested key/value tree that
//! serializes [`FilterPreset`]s and groups them into a
//! [`FilterPresetCollection`].
//!
//! Grammar: `root := { presets: [preset*] }`, `preset := { filterName,
//! name, values }`. No generic config crate (`toml`, `ron`, ...) is
//! reached for here; this hand-rolls a small internal-only textual format
//! rather than pulling in a schema-general parser for something this
//! narrow, the same way `filter.rs` hand-rolls its kernel-weight parsing.

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::path::Path;

use vfx_core::error::{Error, Result};

use crate::filter_kind::FilterPreset;

/// Ordered collection of [`FilterPreset`]s, as loaded from or serialized
/// to the `.bs` grammar.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterPresetCollection {
    presets: Vec<FilterPreset>,
}

impl FilterPresetCollection {
    /// An empty collection.
    pub fn new() -> Self {
        FilterPresetCollection::default()
    }

    /// Appends a preset.
    pub fn push(&mut self, preset: FilterPreset) {
        self.presets.push(preset);
    }

    /// All presets, in collection order.
    pub fn presets(&self) -> &[FilterPreset] {
        &self.presets
    }

    /// Number of presets in the collection.
    pub fn len(&self) -> usize {
        self.presets.len()
    }

    /// `true` if the collection has no presets.
    pub fn is_empty(&self) -> bool {
        self.presets.is_empty()
    }

    /// The sub-collection of presets whose `filter_name` matches
    /// `filter_name`, preserving relative order.
    pub fn collection_for_filter(&self, filter_name: &str) -> Vec<&FilterPreset> {
        self.presets.iter().filter(|p| p.filter_name == filter_name).collect()
    }

    /// Serializes this collection to the `.bs` textual grammar.
    pub fn serialize(&self) -> String {
        let mut out = String::new();
        out.push_str("presets {\n");
        for preset in &self.presets {
            write_preset(&mut out, preset);
        }
        out.push_str("}\n");
        out
    }

    /// Parses a `.bs` textual document into a [`FilterPresetCollection`].
    /// Fails with [`Error::PresetParse`] on malformed text, unknown value
    /// kinds, or mismatched braces; the collection is never partially
    /// populated on failure.
    pub fn parse(text: &str) -> Result<Self> {
        let mut tokens = Tokenizer::new(text);
        tokens.expect_word("presets")?;
        tokens.expect_symbol('{')?;

        let mut collection = FilterPresetCollection::new();
        loop {
            if tokens.peek_symbol('}') {
                tokens.expect_symbol('}')?;
                break;
            }
            collection.push(parse_preset(&mut tokens)?);
        }
        Ok(collection)
    }

    /// Reads and parses a `.bs` file from `path`. Kind: pipeline failure
    /// if the file cannot be read.
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())
            .map_err(|e| Error::pipeline(format!("reading preset file {}: {e}", path.as_ref().display())))?;
        Self::parse(&text)
    }

    /// Serializes and writes this collection to `path`.
    pub fn save_to_path(&self, path: impl AsRef<Path>) -> Result<()> {
        std::fs::write(path.as_ref(), self.serialize())
            .map_err(|e| Error::pipeline(format!("writing preset file {}: {e}", path.as_ref().display())))
    }
}

fn write_preset(out: &mut String, preset: &FilterPreset) {
    let _ = writeln!(
        out,
        "  preset {} {} {{",
        quote(&preset.filter_name),
        quote(&preset.name)
    );
    for (k, v) in &preset.floats {
        let _ = writeln!(out, "    float {k} {v}");
    }
    for (k, v) in &preset.ints {
        let _ = writeln!(out, "    int {k} {v}");
    }
    for (k, v) in &preset.strings {
        let _ = writeln!(out, "    string {k} {}", quote(v));
    }
    for (k, (x, y)) in &preset.points {
        let _ = writeln!(out, "    point {k} {x} {y}");
    }
    for (k, curve) in &preset.curve_tables {
        let _ = write!(out, "    curve {k} {}", curve.len());
        for (x, y) in curve {
            let _ = write!(out, " {x} {y}");
        }
        out.push('\n');
    }
    out.push_str("  }\n");
}

fn quote(s: &str) -> String {
    format!("\"{}\"", s.replace('\\', "\\\\").replace('"', "\\\""))
}

fn parse_preset(tokens: &mut Tokenizer) -> Result<FilterPreset> {
    tokens.expect_word("preset")?;
    let filter_name = tokens.expect_string()?;
    let name = tokens.expect_string()?;
    tokens.expect_symbol('{')?;

    let mut floats = BTreeMap::new();
    let mut ints = BTreeMap::new();
    let mut strings = BTreeMap::new();
    let mut points = BTreeMap::new();
    let mut curve_tables = BTreeMap::new();

    loop {
        if tokens.peek_symbol('}') {
            tokens.expect_symbol('}')?;
            break;
        }
        let kind = tokens.expect_ident()?;
        let key = tokens.expect_ident()?;
        match kind.as_str() {
            "float" => {
                floats.insert(key, tokens.expect_f32()?);
            }
            "int" => {
                ints.insert(key, tokens.expect_i64()?);
            }
            "string" => {
                strings.insert(key, tokens.expect_string()?);
            }
            "point" => {
                let x = tokens.expect_f32()?;
                let y = tokens.expect_f32()?;
                points.insert(key, (x, y));
            }
            "curve" => {
                let count = tokens.expect_i64()? as usize;
                let mut curve = Vec::with_capacity(count);
                for _ in 0..count {
                    let x = tokens.expect_f32()?;
                    let y = tokens.expect_f32()?;
                    curve.push((x, y));
                }
                curve_tables.insert(key, curve);
            }
            other => return Err(Error::preset_parse(format!("unknown value kind '{other}'"))),
        }
    }

    Ok(FilterPreset {
        filter_name,
        name,
        floats,
        ints,
        strings,
        points,
        curve_tables,
    })
}

/// Minimal hand-rolled tokenizer for the `.bs` grammar: whitespace
/// separated words, `{`/`}` symbols, and `"..."` quoted strings.
struct Tokenizer<'a> {
    rest: &'a str,
}

impl<'a> Tokenizer<'a> {
    fn new(text: &'a str) -> Self {
        Tokenizer { rest: text }
    }

    fn skip_ws(&mut self) {
        self.rest = self.rest.trim_start();
    }

    fn peek_symbol(&mut self, c: char) -> bool {
        self.skip_ws();
        self.rest.starts_with(c)
    }

    fn expect_symbol(&mut self, c: char) -> Result<()> {
        self.skip_ws();
        if self.rest.starts_with(c) {
            self.rest = &self.rest[c.len_utf8()..];
            Ok(())
        } else {
            Err(Error::preset_parse(format!("expected '{c}'")))
        }
    }

    fn next_token(&mut self) -> Result<&'a str> {
        self.skip_ws();
        if self.rest.is_empty() {
            return Err(Error::preset_parse("unexpected end of input"));
        }
        let end = self
            .rest
            .find(|c: char| c.is_whitespace() || c == '{' || c == '}')
            .unwrap_or(self.rest.len());
        if end == 0 {
            return Err(Error::preset_parse("expected a token"));
        }
        let (tok, rest) = self.rest.split_at(end);
        self.rest = rest;
        Ok(tok)
    }

    fn expect_word(&mut self, word: &str) -> Result<()> {
        let tok = self.next_token()?;
        if tok == word {
            Ok(())
        } else {
            Err(Error::preset_parse(format!("expected '{word}', got '{tok}'")))
        }
    }

    fn expect_ident(&mut self) -> Result<String> {
        Ok(self.next_token()?.to_string())
    }

    fn expect_string(&mut self) -> Result<String> {
        self.skip_ws();
        if !self.rest.starts_with('"') {
            return Err(Error::preset_parse("expected a quoted string"));
        }
        let mut chars = self.rest[1..].char_indices();
        let mut out = String::new();
        let mut consumed = 1;
        loop {
            match chars.next() {
                Some((i, '"')) => {
                    consumed += i + 1;
                    break;
                }
                Some((i, '\\')) => {
                    let (_, next) = chars.next().ok_or_else(|| Error::preset_parse("unterminated escape"))?;
                    out.push(next);
                    consumed = i + 2 + 1;
                }
                Some((_, c)) => out.push(c),
                None => return Err(Error::preset_parse("unterminated string")),
            }
        }
        self.rest = &self.rest[consumed..];
        Ok(out)
    }

    fn expect_f32(&mut self) -> Result<f32> {
        let tok = self.next_token()?;
        tok.parse::<f32>()
            .map_err(|_| Error::preset_parse(format!("expected a float, got '{tok}'")))
    }

    fn expect_i64(&mut self) -> Result<i64> {
        let tok = self.next_token()?;
        tok.parse::<i64>()
            .map_err(|_| Error::preset_parse(format!("expected an int, got '{tok}'")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_collection() -> FilterPresetCollection {
        let mut c = FilterPresetCollection::new();
        let mut p1 = FilterPreset::new("BWAdaptiveMixer", "mix1");
        p1.floats.insert("weightR".into(), 0.2126);
        p1.floats.insert("weightG".into(), 0.7152);
        p1.ints.insert("iterations".into(), 3);
        p1.strings.insert("note".into(), "has \"quotes\" and \\backslash".into());
        c.push(p1);

        let mut p2 = FilterPreset::new("Vignette", "vig1");
        p2.points.insert("center".into(), (0.5, 0.5));
        p2.curve_tables.insert("falloff".into(), vec![(0.0, 0.0), (1.0, 1.0)]);
        c.push(p2);
        c
    }

    #[test]
    fn round_trip_preserves_all_value_kinds() {
        let c = sample_collection();
        let text = c.serialize();
        let parsed = FilterPresetCollection::parse(&text).unwrap();
        assert_eq!(parsed, c);
    }

    #[test]
    fn collection_for_filter_projects_by_name() {
        let c = sample_collection();
        let vignettes = c.collection_for_filter("Vignette");
        assert_eq!(vignettes.len(), 1);
        assert_eq!(vignettes[0].name, "vig1");
    }

    #[test]
    fn malformed_text_fails_without_partial_state() {
        let err = FilterPresetCollection::parse("presets { preset \"X\" \"y\" { float k notanumber } }");
        assert!(err.is_err());
    }

    #[test]
    fn unknown_value_kind_is_rejected() {
        let err = FilterPresetCollection::parse("presets { preset \"X\" \"y\" { bogus k 1 } }");
        assert!(err.is_err());
    }

    #[test]
    fn empty_collection_round_trips() {
        let c = FilterPresetCollection::new();
        let text = c.serialize();
        let parsed = FilterPresetCollection::parse(&text).unwrap();
        assert_eq!(parsed, c);
    }
}
