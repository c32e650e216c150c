use anyhow::{Context, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Languages the pattern scanner knows how to flag.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Python,
    Javascript,
    Java,
    Go,
    Csharp,
}

impl Language {
    pub fn as_str(&self) -> &'static str {
        match self {
            Language::Python => "python",
            Language::Javascript => "javascript",
            Language::Java => "java",
            Language::Go => "go",
            Language::Csharp => "csharp",
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Immutable lookup tables for the code scanner: file extension to language,
/// and language to its ordered list of crypto-usage regexes.
///
/// Built once at startup and passed explicitly into the scanner, so an
/// alternative registry can be substituted without touching scan logic.
#[derive(Debug)]
pub struct PatternRegistry {
    extensions: HashMap<&'static str, Language>,
    patterns: HashMap<Language, Vec<Regex>>,
}

/// Per-language textual indicators of cryptographic API usage.
/// Textual matching is deliberate: no AST parsing, known false
/// positives/negatives from comments and aliased imports.
const CRYPTO_PATTERNS: &[(Language, &[&str])] = &[
    (
        Language::Python,
        &[
            r"\bimport\s+cryptography\b",
            r"\bfrom\s+cryptography\b",
            r"\bimport\s+Crypto\b",
            r"\bfrom\s+Crypto\b",
            r"\bimport\s+OpenSSL\b",
            r"\bFernet\b",
        ],
    ),
    (
        Language::Javascript,
        &[
            r#"\brequire\(['"]crypto['"]\)"#,
            r"\bwindow\.crypto\b",
            r"\bcrypto\.subtle\b",
            r"\bjsonwebtoken\b",
        ],
    ),
    (
        Language::Java,
        &[
            r"\bjavax\.crypto\b",
            r"\bjava\.security\b",
            r"\bKeyPairGenerator\b",
            r"\bCipher\.getInstance\b",
        ],
    ),
    (Language::Go, &[r"\bcrypto/(rsa|ecdsa|x509|tls)\b"]),
    (Language::Csharp, &[r"\bSystem\.Security\.Cryptography\b"]),
];

/// Extension (without the dot, lowercase) to language.
const EXT_LANG_MAP: &[(&str, Language)] = &[
    ("py", Language::Python),
    ("js", Language::Javascript),
    ("ts", Language::Javascript),
    ("java", Language::Java),
    ("go", Language::Go),
    ("cs", Language::Csharp),
];

impl PatternRegistry {
    /// Compile the built-in registry. Pattern order within a language is preserved.
    pub fn new() -> Result<Self> {
        let mut patterns = HashMap::new();
        for (lang, exprs) in CRYPTO_PATTERNS {
            let mut compiled = Vec::with_capacity(exprs.len());
            for expr in *exprs {
                let re = Regex::new(expr)
                    .with_context(|| format!("invalid {lang} pattern: {expr}"))?;
                compiled.push(re);
            }
            patterns.insert(*lang, compiled);
        }
        let extensions = EXT_LANG_MAP.iter().copied().collect();
        Ok(Self {
            extensions,
            patterns,
        })
    }

    /// Look up the language for a file extension (case-insensitive, no dot).
    pub fn language_for_extension(&self, ext: &str) -> Option<Language> {
        self.extensions.get(ext.to_ascii_lowercase().as_str()).copied()
    }

    /// Ordered pattern list for a language. Empty slice if none registered.
    pub fn patterns_for(&self, lang: Language) -> &[Regex] {
        self.patterns.get(&lang).map(Vec::as_slice).unwrap_or(&[])
    }
}
