use lazy_static::lazy_static;
use regex::Regex;
use rust_stemmers::{Algorithm, Stemmer};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

lazy_static! {
    static ref WORD_RE: Regex = Regex::new(r"(?u)\p{L}[\p{L}\p{N}_']*").expect("valid regex");
    static ref ALPHA_RE: Regex = Regex::new(r"(?u)\p{L}+").expect("valid regex");
    static ref URL_RE: Regex = Regex::new(r"(?:http|www)\S+").expect("valid regex");
    static ref ENGLISH_STEMMER: Stemmer = Stemmer::create(Algorithm::English);
    static ref SPANISH_STEMMER: Stemmer = Stemmer::create(Algorithm::Spanish);
    static ref ENGLISH_STOPWORDS: HashSet<&'static str> = {
        let words: &[&str] = &[
            "a","about","above","after","again","against","all","am","an","and","any","are","aren't","as","at",
            "be","because","been","before","being","below","between","both","but","by",
            "can","can't","cannot","could","couldn't",
            "did","didn't","do","does","doesn't","doing","don't","down","during",
            "each","few","for","from","further",
            "had","hadn't","has","hasn't","have","haven't","having","he","he'd","he'll","he's","her","here","here's","hers","herself","him","himself","his","how","how's",
            "i","i'd","i'll","i'm","i've","if","in","into","is","isn't","it","it's","its","itself",
            "let's","me","more","most","mustn't","my","myself",
            "no","nor","not","of","off","on","once","only","or","other","ought","our","ours","ourselves","out","over","own",
            "same","she","she'd","she'll","she's","should","shouldn't","so","some","such",
            "than","that","that's","the","their","theirs","them","themselves","then","there","there's","these","they","they'd","they'll","they're","they've","this","those","through","to","too",
            "under","until","up","very",
            "was","wasn't","we","we'd","we'll","we're","we've","were","weren't","what","what's","when","when's","where","where's","which","while","who","who's","whom","why","why's","with","won't","would","wouldn't",
            "you","you'd","you'll","you're","you've","your","yours","yourself","yourselves"
        ];
        words.iter().copied().collect()
    };
    static ref SPANISH_STOPWORDS: HashSet<&'static str> = {
        let words: &[&str] = &[
            "a","al","algo","algunas","algunos","ante","antes","como","con","contra","cual","cuando",
            "de","del","desde","donde","durante","e","el","ella","ellas","ellos","en","entre","era","erais","eran","eras","eres","es","esa","esas","ese","eso","esos","esta","estaba","estado","estais","estamos","estan","estar","estas","este","esto","estos","estoy",
            "fue","fuera","fueron","fui","fuimos","ha","habia","han","has","hasta","hay","he",
            "la","las","le","les","lo","los","mas","me","mi","mis","mucho","muchos","muy",
            "nada","ni","no","nos","nosotros","nuestra","nuestras","nuestro","nuestros",
            "o","os","otra","otras","otro","otros","para","pero","poco","por","porque",
            "que","quien","quienes","se","sea","sean","ser","si","sido","sin","sobre","sois","somos","son","soy","su","sus","suya","suyas","suyo","suyos",
            "tambien","tanto","te","tenemos","tener","tengo","ti","tiene","tienen","todo","todos","tu","tus",
            "un","una","uno","unos","vosotros","y","ya","yo"
        ];
        words.iter().copied().collect()
    };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    English,
    Spanish,
}

impl Language {
    fn stemmer(self) -> &'static Stemmer {
        match self {
            Language::English => &*ENGLISH_STEMMER,
            Language::Spanish => &*SPANISH_STEMMER,
        }
    }

    fn stopwords(self) -> &'static HashSet<&'static str> {
        match self {
            Language::English => &*ENGLISH_STOPWORDS,
            Language::Spanish => &*SPANISH_STOPWORDS,
        }
    }
}

impl FromStr for Language {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "english" | "en" => Ok(Language::English),
            "spanish" | "es" => Ok(Language::Spanish),
            other => Err(format!("unsupported language {other:?}")),
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Language::English => f.write_str("english"),
            Language::Spanish => f.write_str("spanish"),
        }
    }
}

/// Every switch of the normalization pipeline. Persisted next to the index so
/// query-time normalization can be checked against build-time normalization.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NormalizerConfig {
    pub language: Language,
    pub lowercase: bool,
    pub strip_urls: bool,
    pub strip_accents: bool,
    pub strip_numbers: bool,
    pub alphabetic_only: bool,
    pub remove_stopwords: bool,
    pub stem: bool,
}

impl Default for NormalizerConfig {
    fn default() -> Self {
        Self {
            language: Language::English,
            lowercase: true,
            strip_urls: true,
            strip_accents: true,
            strip_numbers: false,
            alphabetic_only: false,
            remove_stopwords: true,
            stem: true,
        }
    }
}

impl NormalizerConfig {
    /// Lowercase and split into words; nothing else.
    pub fn lowercase_only() -> Self {
        Self {
            language: Language::English,
            lowercase: true,
            strip_urls: false,
            strip_accents: false,
            strip_numbers: false,
            alphabetic_only: false,
            remove_stopwords: false,
            stem: false,
        }
    }
}

/// Turns raw text into an ordered sequence of normalized tokens.
///
/// Implementations must be deterministic for a fixed [`NormalizerConfig`].
pub trait Normalizer: Send + Sync {
    fn normalize(&self, text: &str) -> Vec<String>;
    fn config(&self) -> &NormalizerConfig;
}

#[derive(Debug, Clone, Default)]
pub struct TextNormalizer {
    config: NormalizerConfig,
}

impl TextNormalizer {
    pub fn new(config: NormalizerConfig) -> Self { Self { config } }
}

impl Normalizer for TextNormalizer {
    /// NFKC, then the configured cleanup steps, then word split, stopword
    /// removal and Snowball stemming.
    fn normalize(&self, text: &str) -> Vec<String> {
        let cfg = &self.config;
        let mut s: String = text.nfkc().collect();
        if cfg.lowercase {
            s = s.to_lowercase();
        }
        if cfg.strip_urls {
            s = URL_RE.replace_all(&s, " ").into_owned();
        }
        if cfg.strip_accents {
            s = s.nfkd().filter(|c| !is_combining_mark(*c)).collect();
        }
        if cfg.strip_numbers {
            s.retain(|c| !c.is_ascii_digit());
        }
        let re: &Regex = if cfg.alphabetic_only { &*ALPHA_RE } else { &*WORD_RE };
        let stopwords = cfg.language.stopwords();
        let stemmer = cfg.language.stemmer();
        let mut tokens = Vec::new();
        for mat in re.find_iter(&s) {
            let token = mat.as_str();
            if cfg.remove_stopwords && stopwords.contains(token) { continue; }
            if cfg.stem {
                tokens.push(stemmer.stem(token).into_owned());
            } else {
                tokens.push(token.to_string());
            }
        }
        tokens
    }

    fn config(&self) -> &NormalizerConfig { &self.config }
}
