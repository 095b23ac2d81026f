//! Statistical language detection
//!
//! Wraps whatlang and maps its ISO 639-3 output to the two-letter codes the
//! rest of the pipeline and the search schema use. Unknown or undetectable
//! text defaults to English.

use whatlang::Lang;

/// Detects the language of the given text, returning a two-letter code
pub fn detect_language(text: &str) -> String {
    match whatlang::detect_lang(text) {
        Some(lang) => two_letter_code(lang).to_string(),
        None => "en".to_string(),
    }
}

/// Maps a whatlang language to its ISO 639-1 code
fn two_letter_code(lang: Lang) -> &'static str {
    match lang {
        Lang::Eng => "en",
        Lang::Spa => "es",
        Lang::Fra => "fr",
        Lang::Deu => "de",
        Lang::Ita => "it",
        Lang::Por => "pt",
        Lang::Nld => "nl",
        Lang::Rus => "ru",
        Lang::Ukr => "uk",
        Lang::Pol => "pl",
        Lang::Ces => "cs",
        Lang::Slk => "sk",
        Lang::Slv => "sl",
        Lang::Hrv => "hr",
        Lang::Srp => "sr",
        Lang::Mkd => "mk",
        Lang::Bul => "bg",
        Lang::Bel => "be",
        Lang::Ron => "ro",
        Lang::Hun => "hu",
        Lang::Ell => "el",
        Lang::Dan => "da",
        Lang::Swe => "sv",
        Lang::Nob => "no",
        Lang::Fin => "fi",
        Lang::Est => "et",
        Lang::Lav => "lv",
        Lang::Lit => "lt",
        Lang::Tur => "tr",
        Lang::Ara => "ar",
        Lang::Heb => "he",
        Lang::Pes => "fa",
        Lang::Urd => "ur",
        Lang::Hin => "hi",
        Lang::Ben => "bn",
        Lang::Mar => "mr",
        Lang::Guj => "gu",
        Lang::Pan => "pa",
        Lang::Tam => "ta",
        Lang::Tel => "te",
        Lang::Kan => "kn",
        Lang::Mal => "ml",
        Lang::Sin => "si",
        Lang::Nep => "ne",
        Lang::Tha => "th",
        Lang::Vie => "vi",
        Lang::Ind => "id",
        Lang::Jav => "jv",
        Lang::Tgl => "tl",
        Lang::Cmn => "zh",
        Lang::Jpn => "ja",
        Lang::Kor => "ko",
        Lang::Kat => "ka",
        Lang::Hye => "hy",
        Lang::Aze => "az",
        Lang::Uzb => "uz",
        Lang::Cat => "ca",
        Lang::Afr => "af",
        Lang::Amh => "am",
        Lang::Mya => "my",
        Lang::Khm => "km",
        Lang::Lat => "la",
        Lang::Epo => "eo",
        // Remaining long-tail languages fall back to English rather than
        // leaking three-letter codes into the keyword field
        _ => "en",
    }
}
