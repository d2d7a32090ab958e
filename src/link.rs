//! `Link` header parsing for cursor-style pagination.
//!
//! The header is a comma-separated list of `<url>; param=value` entries. Only the `rel`
//! parameter matters here; the URL of the entry whose relation includes `next` is the
//! pagination cursor. Anything unparseable ends pagination instead of erroring, because
//! guessing that more pages exist could loop forever.

/// Returns the URL of the `rel="next"` entry, or `None` when there is none or the header is
/// malformed.
pub fn next_link(header: Option<&str>) -> Option<&str> {
	find_relation(header?, "next")
}

/// Returns the URL of the first entry whose `rel` includes `relation`.
pub fn find_relation<'a>(header: &'a str, relation: &str) -> Option<&'a str> {
	let mut rest = header.trim();

	while !rest.is_empty() {
		let open = rest.strip_prefix('<')?;
		let close = open.find('>')?;
		let url = &open[..close];
		let after = &open[close + 1..];
		let (params, next) = match after.find(',') {
			Some(idx) => (&after[..idx], &after[idx + 1..]),
			None => (after, ""),
		};

		if has_relation(params, relation) {
			return Some(url.trim());
		}

		rest = next.trim_start();
	}

	None
}

fn has_relation(params: &str, relation: &str) -> bool {
	params.split(';').filter_map(|param| param.split_once('=')).any(|(name, value)| {
		name.trim().eq_ignore_ascii_case("rel")
			&& value
				.trim()
				.trim_matches('"')
				.split_ascii_whitespace()
				.any(|candidate| candidate.eq_ignore_ascii_case(relation))
	})
}
