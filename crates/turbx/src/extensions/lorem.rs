// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! `<_lorem type min max rep=n/>` placeholder text.
//!
//! | type | output                                   | default range |
//! |------|------------------------------------------|---------------|
//! | `p`  | `<p>` paragraph of min..max sentences    | 2..5          |
//! | `s`  | sentence of min..max words               | 4..12         |
//! | `w`  | one word of min..max letters             | 3..10         |
//! | `h`  | host name                                |               |
//! | `e`  | email address                            |               |
//! | `u`  | URL                                      |               |
//!
//! The first positional number is the minimum; a lone number is also the
//! maximum. `min=`, `max=` and `type=` may be given by name.

use super::{FunctionContext, TagFunction};
use rand::seq::SliceRandom;
use rand::Rng;

const WORDS: &[&str] = &[
    "lorem", "ipsum", "dolor", "sit", "amet", "consectetur", "adipiscing", "elit", "sed", "do",
    "eiusmod", "tempor", "incididunt", "ut", "labore", "et", "dolore", "magna", "aliqua", "enim",
    "ad", "minim", "veniam", "quis", "nostrud", "exercitation", "ullamco", "laboris", "nisi",
    "aliquip", "ex", "ea", "commodo", "consequat", "duis", "aute", "irure", "in",
    "reprehenderit", "voluptate", "velit", "esse", "cillum", "fugiat", "nulla", "pariatur",
    "excepteur", "sint", "occaecat", "cupidatat", "non", "proident", "sunt", "culpa", "qui",
    "officia", "deserunt", "mollit", "anim", "id", "est", "laborum", "porta", "nibh", "venenatis",
    "cras", "semper", "auctor", "neque", "vitae", "tempus", "quam", "pellentesque", "nec", "nam",
    "aliquam", "faucibus", "purus", "viverra", "accumsan", "lacus", "vel", "facilisis",
];

const TLDS: &[&str] = &["com", "net", "org", "io", "dev"];

/// The `lorem` tag function.
#[derive(Debug, Clone, Copy, Default)]
pub struct Lorem;

/// What to generate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoremKind {
    /// Paragraph.
    Paragraph,
    /// Sentence.
    Sentence,
    /// Word.
    Word,
    /// Host name.
    Host,
    /// Email address.
    Email,
    /// URL.
    Url,
}

impl LoremKind {
    fn parse(s: &str) -> Option<Self> {
        Some(match s.chars().next()?.to_ascii_lowercase() {
            'p' => LoremKind::Paragraph,
            's' => LoremKind::Sentence,
            'w' => LoremKind::Word,
            'h' => LoremKind::Host,
            'e' => LoremKind::Email,
            'u' => LoremKind::Url,
            _ => return None,
        })
    }

    fn default_range(self) -> (usize, usize) {
        match self {
            LoremKind::Paragraph => (2, 5),
            LoremKind::Sentence => (4, 12),
            _ => (3, 10),
        }
    }
}

/// Parsed `lorem` arguments.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoremSpec {
    /// What to generate.
    pub kind: LoremKind,
    /// Lower bound.
    pub min: usize,
    /// Upper bound.
    pub max: usize,
    /// Repetitions.
    pub rep: usize,
}

fn word<R: Rng>(rng: &mut R, min: usize, max: usize) -> String {
    let fitting: Vec<&&str> = WORDS
        .iter()
        .filter(|w| (min..=max).contains(&w.len()))
        .collect();
    match fitting.choose(rng) {
        Some(w) => w.to_string(),
        None => WORDS.choose(rng).copied().unwrap_or("lorem").to_string(),
    }
}

fn sentence<R: Rng>(rng: &mut R, min: usize, max: usize) -> String {
    let count = rng.gen_range(min.max(1)..=max.max(1));
    let mut words: Vec<String> = (0..count).map(|_| word(rng, 1, 20)).collect();
    if let Some(first) = words.first_mut() {
        let mut chars = first.chars();
        if let Some(c) = chars.next() {
            *first = c.to_uppercase().chain(chars).collect();
        }
    }
    format!("{}.", words.join(" "))
}

fn host<R: Rng>(rng: &mut R) -> String {
    format!(
        "{}-{}.{}",
        word(rng, 3, 8),
        word(rng, 3, 8),
        TLDS.choose(rng).copied().unwrap_or("com")
    )
}

impl LoremSpec {
    /// Generates the text.
    pub fn generate<R: Rng>(&self, rng: &mut R) -> String {
        let rep = self.rep.max(1);
        match self.kind {
            LoremKind::Paragraph => (0..rep)
                .map(|_| {
                    let count = rng.gen_range(self.min.max(1)..=self.max.max(1));
                    let text: Vec<String> = (0..count).map(|_| sentence(rng, 4, 12)).collect();
                    format!("<p>{}</p>", text.join(" "))
                })
                .collect::<Vec<_>>()
                .join("\n\n"),
            LoremKind::Sentence => (0..rep)
                .map(|_| sentence(rng, self.min, self.max))
                .collect::<Vec<_>>()
                .join(" "),
            LoremKind::Word => (0..rep)
                .map(|_| word(rng, self.min, self.max))
                .collect::<Vec<_>>()
                .join(" "),
            LoremKind::Host => host(rng),
            LoremKind::Email => format!("{}@{}", word(rng, 3, 10), host(rng)),
            LoremKind::Url => format!("https://{}/{}", host(rng), word(rng, 3, 10)),
        }
    }
}

/// Ceiling for `min`/`max`; words and sentences never need more.
pub const MAX_COUNT: usize = 100;
/// Ceiling for `rep`.
pub const MAX_REP: usize = 50;

fn number(s: &str) -> Option<usize> {
    s.trim().parse().ok()
}

/// Reads the arguments of a call. `None` when any depends on request data.
pub fn parse_spec(ctx: &FunctionContext<'_>) -> Option<LoremSpec> {
    let mut kind = None;
    let mut numbers = Vec::new();
    for arg in ctx.attrs.args() {
        match number(arg) {
            Some(n) => numbers.push(n),
            None if kind.is_none() => kind = LoremKind::parse(arg),
            None => {}
        }
    }
    if let Some(t) = ctx.word("type")? {
        kind = LoremKind::parse(&t).or(kind);
    }
    let kind = kind.unwrap_or(LoremKind::Paragraph);
    let (default_min, default_max) = kind.default_range();

    let named = |key: &str| -> Option<Option<usize>> { Some(ctx.word(key)?.and_then(|v| number(&v))) };
    let min = named("min")?.or(numbers.first().copied());
    let max = named("max")?.or(numbers.get(1).copied()).or(min);
    let rep = named("rep")?.unwrap_or(1).min(MAX_REP);

    let mut min = min.unwrap_or(default_min).min(MAX_COUNT);
    let mut max = max.unwrap_or(default_max).min(MAX_COUNT);
    if min > max {
        std::mem::swap(&mut min, &mut max);
    }
    Some(LoremSpec { kind, min, max, rep })
}

impl TagFunction for Lorem {
    fn call(&self, ctx: &FunctionContext<'_>) -> Option<String> {
        let spec = parse_spec(ctx)?;
        Some(spec.generate(&mut rand::thread_rng()))
    }

    fn pre_aware(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tags::AttrSet;
    use crate::value::Scope;
    use crate::vars::Resolver;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn spec(attrs: AttrSet) -> Option<LoremSpec> {
        let scope = Scope::new();
        let ctx = FunctionContext {
            name: "lorem",
            attrs: &attrs,
            content: None,
            resolver: Resolver::new(&scope, &[], true),
            assets: "",
            oembed: None,
        };
        parse_spec(&ctx)
    }

    #[test]
    fn test_defaults() {
        let s = spec(AttrSet::new()).unwrap();
        assert_eq!((s.kind, s.min, s.max, s.rep), (LoremKind::Paragraph, 2, 5, 1));
        let s = spec(AttrSet::positional(["s"])).unwrap();
        assert_eq!((s.kind, s.min, s.max), (LoremKind::Sentence, 4, 12));
    }

    #[test]
    fn test_positional_numbers() {
        let s = spec(AttrSet::positional(["w", "5"])).unwrap();
        assert_eq!((s.kind, s.min, s.max), (LoremKind::Word, 5, 5));
        let s = spec(AttrSet::positional(["s", "9", "3"])).unwrap();
        assert_eq!((s.min, s.max), (3, 9));
    }

    #[test]
    fn test_max_sets_maximum() {
        let mut attrs = AttrSet::positional(["w"]);
        attrs.insert("min", "4");
        attrs.insert("max", "6");
        attrs.insert("rep", "3");
        let s = spec(attrs).unwrap();
        assert_eq!((s.min, s.max, s.rep), (4, 6, 3));
    }

    #[test]
    fn test_huge_counts_are_clamped() {
        let mut attrs = AttrSet::positional(["p", "1000000000", "999999999999"]);
        attrs.insert("rep", "1000000000");
        let s = spec(attrs).unwrap();
        assert_eq!((s.min, s.max, s.rep), (MAX_COUNT, MAX_COUNT, MAX_REP));

        let s = spec(AttrSet::positional(["w", "5000"])).unwrap();
        let mut rng = StdRng::seed_from_u64(3);
        assert!(!s.generate(&mut rng).is_empty());
    }

    #[test]
    fn test_unknown_argument_defers() {
        let mut attrs = AttrSet::new();
        attrs.insert("type", "{{kind}}");
        assert!(spec(attrs).is_none());
    }

    #[test]
    fn test_generate() {
        let mut rng = StdRng::seed_from_u64(7);
        let words = LoremSpec { kind: LoremKind::Word, min: 3, max: 5, rep: 4 }.generate(&mut rng);
        assert_eq!(words.split(' ').count(), 4);
        assert!(words.split(' ').all(|w| (3..=5).contains(&w.len())));

        let para = LoremSpec { kind: LoremKind::Paragraph, min: 2, max: 2, rep: 2 }.generate(&mut rng);
        assert_eq!(para.matches("<p>").count(), 2);
        assert!(para.contains("</p>\n\n<p>"));

        let sentence = LoremSpec { kind: LoremKind::Sentence, min: 3, max: 3, rep: 1 }.generate(&mut rng);
        assert!(sentence.ends_with('.'));
        assert_eq!(sentence.split(' ').count(), 3);
        assert!(sentence.chars().next().unwrap().is_uppercase());

        let email = LoremSpec { kind: LoremKind::Email, min: 0, max: 0, rep: 1 }.generate(&mut rng);
        assert!(email.contains('@') && email.contains('.'));
        let url = LoremSpec { kind: LoremKind::Url, min: 0, max: 0, rep: 1 }.generate(&mut rng);
        assert!(url.starts_with("https://"));
    }
}
