use anyhow::{Result, anyhow};
use isolang::Language;
use once_cell::sync::Lazy;
use std::collections::HashMap;

/// Language utilities
///
/// Target languages are restricted to the table below; it mixes ISO 639-1 codes
/// with the few codes the translation backend understands that have no
/// 2-letter form (`ckb`, `fil`, `haw`, ...) and regional variants (`zh-TW`).
/// Source languages are plain ISO 639 codes validated through `isolang`.
///
/// Columns: code, English name, native name.
const SUPPORTED_LANGUAGES: &[(&str, &str, &str)] = &[
    // Middle Eastern
    ("ckb", "Kurdish (Sorani)", "کوردی"),
    ("ku", "Kurdish (Kurmanji)", "Kurmancî"),
    ("ar", "Arabic", "العربية"),
    ("fa", "Persian", "فارسی"),
    ("tr", "Turkish", "Türkçe"),
    ("he", "Hebrew", "עברית"),
    ("ur", "Urdu", "اردو"),
    ("ps", "Pashto", "پښتو"),
    ("sd", "Sindhi", "سنڌي"),
    // European
    ("en", "English", "English"),
    ("es", "Spanish", "Español"),
    ("fr", "French", "Français"),
    ("de", "German", "Deutsch"),
    ("it", "Italian", "Italiano"),
    ("pt", "Portuguese", "Português"),
    ("ru", "Russian", "Русский"),
    ("nl", "Dutch", "Nederlands"),
    ("pl", "Polish", "Polski"),
    ("uk", "Ukrainian", "Українська"),
    ("ro", "Romanian", "Română"),
    ("hu", "Hungarian", "Magyar"),
    ("cs", "Czech", "Čeština"),
    ("el", "Greek", "Ελληνικά"),
    ("sv", "Swedish", "Svenska"),
    ("da", "Danish", "Dansk"),
    ("fi", "Finnish", "Suomi"),
    ("no", "Norwegian", "Norsk"),
    ("bg", "Bulgarian", "Български"),
    ("hr", "Croatian", "Hrvatski"),
    ("sr", "Serbian", "Српски"),
    ("sk", "Slovak", "Slovenčina"),
    ("sl", "Slovenian", "Slovenščina"),
    ("lt", "Lithuanian", "Lietuvių"),
    ("lv", "Latvian", "Latviešu"),
    ("et", "Estonian", "Eesti"),
    ("ga", "Irish", "Gaeilge"),
    ("mt", "Maltese", "Malti"),
    // Asian
    ("zh", "Chinese (Simplified)", "中文"),
    ("zh-TW", "Chinese (Traditional)", "繁體中文"),
    ("ja", "Japanese", "日本語"),
    ("ko", "Korean", "한국어"),
    ("hi", "Hindi", "हिन्दी"),
    ("bn", "Bengali", "বাংলা"),
    ("ta", "Tamil", "தமிழ்"),
    ("te", "Telugu", "తెలుగు"),
    ("mr", "Marathi", "मराठी"),
    ("th", "Thai", "ไทย"),
    ("vi", "Vietnamese", "Tiếng Việt"),
    ("id", "Indonesian", "Bahasa Indonesia"),
    ("ms", "Malay", "Bahasa Melayu"),
    ("fil", "Filipino", "Filipino"),
    ("my", "Burmese", "မြန်မာစာ"),
    ("km", "Khmer", "ភាសាខ្មែរ"),
    ("lo", "Lao", "ລາວ"),
    ("ne", "Nepali", "नेपाली"),
    ("si", "Sinhala", "සිංහල"),
    ("pa", "Punjabi", "ਪੰਜਾਬੀ"),
    ("gu", "Gujarati", "ગુજરાતી"),
    ("kn", "Kannada", "ಕನ್ನಡ"),
    ("ml", "Malayalam", "മലയാളം"),
    ("or", "Odia", "ଓଡ଼ିଆ"),
    // African
    ("sw", "Swahili", "Kiswahili"),
    ("am", "Amharic", "አማርኛ"),
    ("yo", "Yoruba", "Yorùbá"),
    ("ig", "Igbo", "Igbo"),
    ("ha", "Hausa", "Hausa"),
    ("zu", "Zulu", "isiZulu"),
    ("xh", "Xhosa", "isiXhosa"),
    ("st", "Sotho", "Sesotho"),
    ("sn", "Shona", "chiShona"),
    ("mg", "Malagasy", "Malagasy"),
    ("so", "Somali", "Soomaali"),
    ("rw", "Kinyarwanda", "Kinyarwanda"),
    // Other major
    ("az", "Azerbaijani", "Azərbaycan"),
    ("be", "Belarusian", "Беларуская"),
    ("ca", "Catalan", "Català"),
    ("eu", "Basque", "Euskara"),
    ("gl", "Galician", "Galego"),
    ("is", "Icelandic", "Íslenska"),
    ("mk", "Macedonian", "Македонски"),
    ("sq", "Albanian", "Shqip"),
    ("bs", "Bosnian", "Bosanski"),
    ("hy", "Armenian", "Հայերեն"),
    ("ka", "Georgian", "ქართული"),
    ("mn", "Mongolian", "Монгол"),
    ("kk", "Kazakh", "Қазақ"),
    ("ky", "Kyrgyz", "Кыргызча"),
    ("uz", "Uzbek", "Oʻzbek"),
    ("tg", "Tajik", "Тоҷикӣ"),
    ("tk", "Turkmen", "Türkmen"),
    // South Asian
    ("as", "Assamese", "অসমীয়া"),
    ("mai", "Maithili", "मैथिली"),
    ("mni", "Manipuri", "মৈতৈলোন্"),
    ("sat", "Santali", "ᱥᱟᱱᱛᱟᱲᱤ"),
    ("kok", "Konkani", "कोंकणी"),
    ("doi", "Dogri", "डोगरी"),
    ("ks", "Kashmiri", "کٲشُر"),
    ("brx", "Bodo", "बड़ो"),
    // Additional
    ("af", "Afrikaans", "Afrikaans"),
    ("lb", "Luxembourgish", "Lëtzebuergesch"),
    ("fy", "Frisian", "Frysk"),
    ("cy", "Welsh", "Cymraeg"),
    ("br", "Breton", "Brezhoneg"),
    ("gd", "Scottish Gaelic", "Gàidhlig"),
    ("gv", "Manx", "Gaelg"),
    ("kw", "Cornish", "Kernewek"),
    ("fo", "Faroese", "Føroyskt"),
    ("sm", "Samoan", "Gagana Samoa"),
    ("mi", "Maori", "Māori"),
    ("haw", "Hawaiian", "ʻŌlelo Hawaiʻi"),
    ("ty", "Tahitian", "Reo Tahiti"),
    ("to", "Tongan", "Lea faka-Tonga"),
    ("fj", "Fijian", "Na Vosa Vakaviti"),
    ("bi", "Bislama", "Bislama"),
    ("tpi", "Tok Pisin", "Tok Pisin"),
    ("chr", "Cherokee", "ᏣᎳᎩ"),
    ("iu", "Inuktitut", "ᐃᓄᒃᑎᑐᑦ"),
    ("oj", "Ojibwe", "ᐊᓂᔑᓈᐯᒧᐎᓐ"),
    ("cr", "Cree", "ᓀᐦᐃᔭᐍᐏᐣ"),
];

/// Default target language when a request does not name one
pub const DEFAULT_TARGET_LANGUAGE: &str = "ckb";

static LANGUAGE_INDEX: Lazy<HashMap<&'static str, &'static str>> =
    Lazy::new(|| SUPPORTED_LANGUAGES.iter().map(|&(code, name, _)| (code, name)).collect());

/// A supported target language
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SupportedLanguage {
    pub code: &'static str,
    pub name: &'static str,
    pub native_name: &'static str,
}

/// Check whether a target language code is supported (exact, case-sensitive
/// match, since `zh-TW` is distinct from `zh`)
pub fn is_supported(code: &str) -> bool {
    LANGUAGE_INDEX.contains_key(code)
}

/// English display name of a supported target language
pub fn language_name(code: &str) -> Option<&'static str> {
    LANGUAGE_INDEX.get(code).copied()
}

/// All supported target languages in table order
pub fn supported_languages() -> impl Iterator<Item = SupportedLanguage> {
    SUPPORTED_LANGUAGES
        .iter()
        .map(|&(code, name, native_name)| SupportedLanguage { code, name, native_name })
}

/// Case-insensitive search over codes, English names and native names
pub fn search_languages(term: &str) -> Vec<SupportedLanguage> {
    let needle = term.trim().to_lowercase();
    if needle.is_empty() {
        return supported_languages().collect();
    }

    supported_languages()
        .filter(|lang| {
            lang.code.to_lowercase().contains(&needle)
                || lang.name.to_lowercase().contains(&needle)
                || lang.native_name.to_lowercase().contains(&needle)
        })
        .collect()
}

/// Validate a source language code (ISO 639-1 or 639-3) and return its name
pub fn source_language_name(code: &str) -> Result<String> {
    let normalized = code.trim().to_lowercase();

    let lang = match normalized.len() {
        2 => Language::from_639_1(&normalized),
        3 => Language::from_639_3(&normalized),
        _ => None,
    };

    lang.map(|l| l.to_name().to_string())
        .ok_or_else(|| anyhow!("Invalid source language code: {}", code))
}
