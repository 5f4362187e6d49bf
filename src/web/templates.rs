//! HTML skeleton for the companion UI. A handful of static pages, no asset
//! pipeline.

const SKELETON: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
<title>%(title)s — padctl</title>
<style>
body { font-family: system-ui, sans-serif; max-width: 48rem; margin: 2rem auto; padding: 0 1rem; }
header { display: flex; justify-content: space-between; align-items: baseline;
         border-bottom: 1px solid #ccc; margin-bottom: 1rem; }
label { display: block; margin-top: .75rem; }
input[type=text], input[type=password], textarea { width: 100%; box-sizing: border-box; }
button { margin-top: 1rem; }
table { border-collapse: collapse; }
td, th { border: 1px solid #ccc; padding: .25rem .5rem; }
.error { background: #fdd; border: 1px solid #c00; padding: .5rem; margin-bottom: 1rem; }
.ok { background: #dfd; border: 1px solid #0a0; padding: .5rem; margin-bottom: 1rem; }
</style>
</head>
<body>
<header>
<h1><a href="/">padctl</a></h1>
<div>%(user)s</div>
</header>
<h2>%(title)s</h2>
%(body)s
</body>
</html>
"#;

/// Render a page. `user_line` and `body` are trusted HTML; user-supplied
/// values must be escaped by the caller.
pub fn page(title: &str, user_line: &str, body: &str) -> String {
    SKELETON
        .replace("%(title)s", &escape(title))
        .replace("%(user)s", user_line)
        .replace("%(body)s", body)
}

/// Minimal HTML escaping for text interpolated into pages.
pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(ch),
        }
    }
    out
}
