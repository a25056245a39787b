/// Display name for a language code written by the pipeline's language
/// detector. Unknown codes are shown as-is.
pub fn language_name(code: &str) -> &str {
    match code {
        "ar" => "Arabic",
        "da" => "Danish",
        "de" => "German",
        "en" => "English",
        "es" => "Spanish",
        "fi" => "Finnish",
        "fr" => "French",
        "hu" => "Hungarian",
        "it" => "Italian",
        "nl" => "Dutch",
        "no" => "Norwegian",
        "pt" => "Portuguese",
        "ro" => "Romanian",
        "ru" => "Russian",
        "sv" => "Swedish",
        "tr" => "Turkish",
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_and_unknown_codes() {
        assert_eq!(language_name("en"), "English");
        assert_eq!(language_name("pt"), "Portuguese");
        assert_eq!(language_name("xx"), "xx");
    }
}
