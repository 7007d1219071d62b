//! reveal.js viewer page.

use linkslide_core::layout::file_name_of;
use linkslide_core::SlideRecord;

const REVEAL_CDN: &str = "https://cdn.jsdelivr.net/npm/reveal.js@4.5.0/dist";

/// Render the viewer page. Image references resolve relative to the page so
/// the same markup works when served and when unzipped.
pub fn render(slides: &[SlideRecord]) -> String {
    let sections: String = slides.iter().map(render_section).collect();
    format!(
        r#"<!doctype html>
<html>
    <head>
        <meta charset="utf-8">
        <title>Generated Presentation</title>
        <link rel="stylesheet" href="{REVEAL_CDN}/reveal.css">
        <link rel="stylesheet" href="{REVEAL_CDN}/theme/black.css">
    </head>
    <body>
        <div class="reveal">
            <div class="slides">
{sections}            </div>
        </div>
        <script src="{REVEAL_CDN}/reveal.js"></script>
        <script>
            Reveal.initialize({{ hash: true }});
        </script>
    </body>
</html>
"#
    )
}

fn render_section(slide: &SlideRecord) -> String {
    let notes = escape(&slide.script);
    if slide.is_failed() {
        format!(
            "                <section>\n                    <h3>Slide {}</h3>\n                    <p>{}</p>\n                    <aside class=\"notes\">{notes}</aside>\n                </section>\n",
            slide.page,
            escape(&slide.image_path),
        )
    } else {
        format!(
            "                <section data-background-image=\"{}\" data-background-size=\"contain\">\n                    <aside class=\"notes\">{notes}</aside>\n                </section>\n",
            escape(file_name_of(&slide.image_path)),
        )
    }
}

pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
