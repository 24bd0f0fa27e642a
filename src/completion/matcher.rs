use nucleo_matcher::{
    pattern::{CaseMatching, Normalization, Pattern},
    Config, Matcher, Utf32Str,
};

/// Keeps the candidates whose text fuzzy-matches `query`. An empty query
/// keeps everything. Order is preserved.
pub fn fuzzy_filter<T>(query: &str, candidates: Vec<T>, text: impl Fn(&T) -> String) -> Vec<T> {
    if query.trim().is_empty() {
        return candidates;
    }

    let mut matcher = Matcher::new(Config::DEFAULT);
    let pattern = Pattern::parse(query, CaseMatching::Ignore, Normalization::Smart);
    let mut buf = Vec::new();

    candidates
        .into_iter()
        .filter(|candidate| {
            let haystack = text(candidate);
            pattern
                .score(Utf32Str::new(&haystack, &mut buf), &mut matcher)
                .is_some()
        })
        .collect()
}
