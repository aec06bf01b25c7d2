//! Headless Render Demo
//!
//! Renders a formatted block with the in-memory backend and writes the
//! resulting texture to a PNG.
//!
//! Run with: cargo run -p fontera --example headless_render -- [output.png]

use fontera::prelude::*;
use fontera::{init_logging, StaticHost};
use std::error::Error;

fn main() -> std::result::Result<(), Box<dyn Error>> {
    let config = FonteraConfig::default();
    init_logging(&config.log_filter);

    let mut fontera: Fontera<MemoryBackend> = Fontera::new(config);
    fontera.on_client_start(|| tracing::info!("Client started"))?;
    fontera.client_started(MemoryBackend::new())?;

    let mut host = StaticHost::new(2.0);
    let options = RenderOptions::default()
        .with_background(Background::PerLine)
        .with_align(Alignment::Center);
    let lines = [
        "&6Fontera &7headless demo",
        "&aGreen &lbold &r&cred &oitalic&r &nunder&r",
        "&bscramble: &kabcdef&r done",
    ];

    let renderer = fontera.text_renderer();
    let Some(quad) = renderer.render_lines(&mut host, &lines, 0.0, 0.0, &options)? else {
        return Err("texture was not uploaded".into());
    };
    tracing::info!("Rendered {:?}", quad);

    let image = renderer
        .cache()
        .find_by_texture_id(&quad.texture_id)
        .and_then(|entry| {
            let upload = entry.upload().borrow();
            let backend = renderer.cache().context().backend()?;
            let image = upload.texture().and_then(|texture| backend.read_texture(texture));
            image
        })
        .ok_or("texture not found in cache")?;

    let output = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "fontera_headless.png".to_string());
    image.save(&output)?;
    println!("Wrote {}x{} texture to {}", image.width(), image.height(), output);

    Ok(())
}
