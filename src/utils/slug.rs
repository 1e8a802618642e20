/// Builds a URL-safe slug: lower-case, trim, drop everything outside
/// `[a-z0-9]`, whitespace and `-`, turn whitespace into hyphens, then collapse
/// repeated hyphens.
///
/// The server never re-derives slugs from names. Admin tooling gets this
/// through `GET /api/admin/slug?text=` so it produces the shape the site expects.
pub fn slugify(input: &str) -> String {
    let lowered = input.trim().to_lowercase();

    let mut slug = String::with_capacity(lowered.len());
    for c in lowered.chars() {
        let c = match c {
            'a'..='z' | '0'..='9' | '-' => c,
            c if c.is_whitespace() => '-',
            _ => continue,
        };
        if c == '-' && slug.ends_with('-') {
            continue;
        }
        slug.push(c);
    }

    slug
}
