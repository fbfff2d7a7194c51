use unicode_segmentation::UnicodeSegmentation;

#[derive(Debug, Default, Clone, Copy)]
pub struct Segmentator;

impl Segmentator {
    pub fn new() -> Self {
        Segmentator
    }

    pub fn parse_tokens<'a>(&self, text: &'a str) -> Vec<&'a str>{
        text.unicode_words().collect()
    }

    pub fn normalize(&self, text: &str) -> String {
        text.to_lowercase()
    }
}


#[test]
fn test_parse_tokens() {
    let text = "Air–water two-phase FLOW, in a helical channel!";
    let seg = Segmentator::new();
    let normalized = seg.normalize(text);
    let tokens = seg.parse_tokens(&normalized);
    assert_eq!(tokens, vec!["air", "water", "two", "phase", "flow", "in", "a", "helical", "channel"]);
}
