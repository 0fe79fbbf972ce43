//! Transcode a JSON document (first CLI argument, or a built-in sample)
//! and show the emitted VPack bytes plus the dumped round trip.

use vpack::{Dumper, Parser, Slice};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let json = std::env::args()
        .nth(1)
        .unwrap_or_else(|| r#"{"b":[1,2,3],"a":"some text","n":-0.5}"#.to_string());

    let mut parser = Parser::new();
    let count = parser.parse(json.as_bytes(), false)?;
    let bytes = parser.steal().into_bytes();

    println!("{count} value(s), {} JSON bytes -> {} VPack bytes", json.len(), bytes.len());
    for chunk in bytes.chunks(16) {
        let hex: Vec<String> = chunk.iter().map(|b| format!("{b:02x}")).collect();
        println!("  {}", hex.join(" "));
    }

    let round = Dumper::dump(Slice::new(&bytes))?;
    println!("back to JSON: {}", String::from_utf8_lossy(&round));
    Ok(())
}
