// Thin text glue around the core: corpus tokenizing and output formatting.
//
// Corpus format: one piece per non-empty line, phrases separated by `|`,
// chords separated by whitespace or commas. Lines starting with `#` are
// comments. Chord symbols are taken verbatim; no chord theory is applied.
//
//     D A Bm F#m G D G A | D A Bm F#m G D G A
//     C, G, Am, F | C, G, F, C

/// Chord symbols of one phrase.
pub type Phrase = Vec<String>;

/// Phrases of one piece, in order.
pub type Piece = Vec<Phrase>;

pub fn parse_phrase(text: &str) -> Phrase {
    text.split(|c: char| c.is_whitespace() || c == ',')
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

pub fn parse_piece(line: &str) -> Piece {
    line.split('|')
        .map(parse_phrase)
        .filter(|p| !p.is_empty())
        .collect()
}

pub fn parse_corpus(text: &str) -> Vec<Piece> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(parse_piece)
        .filter(|piece| !piece.is_empty())
        .collect()
}

/// Join chords with spaces, inserting ` | ` after every `phrase_length`
/// chords.
pub fn format_progression<S: AsRef<str>>(chords: &[S], phrase_length: usize) -> String {
    chords
        .chunks(phrase_length.max(1))
        .map(|phrase| {
            phrase
                .iter()
                .map(|chord| chord.as_ref())
                .collect::<Vec<&str>>()
                .join(" ")
        })
        .collect::<Vec<_>>()
        .join(" | ")
}
