use fontera_text::palette::{SHADOW_COLOR, TEXT_COLOR};
use fontera_text::{
    create_image, parse, parse_markup, parse_with_rng, Alignment, Background, Compositor,
    FontRegistry, FontSet, FormatSpan, RenderConfig,
};
use image::{Rgba, RgbaImage};
use rand::rngs::StdRng;
use rand::SeedableRng;

#[test]
fn unmarked_text_parses_to_itself() {
    for text in ["", "plain", "50% off!", "tabs\tand spaces  ", "ünïcödé ✓"] {
        let parsed = parse_markup(text);
        assert_eq!(parsed.text, text);
        assert!(parsed.spans.is_empty(), "{text:?} produced spans");
        assert!(parsed.animations.is_empty(), "{text:?} produced animations");
    }
}

#[test]
fn reset_closes_every_open_span_at_its_position() {
    let parsed = parse_markup("&6&l&ngold&r rest");
    assert_eq!(parsed.text, "gold rest");
    for span in &parsed.spans {
        assert_eq!((span.start, span.end), (0, 4), "span {:?}", span);
    }
    let mut codes: Vec<char> = parsed.spans.iter().map(|s| s.code).collect();
    codes.sort_unstable();
    assert_eq!(codes, vec!['6', 'l', 'n']);
}

#[test]
fn color_spans_never_overlap() {
    let parsed = parse_markup("&1a&2b&3c&4d&r&5e");
    let colors: Vec<FormatSpan> = parsed.spans.iter().copied().filter(|s| s.is_color()).collect();

    assert_eq!(colors.len(), 5);
    for pair in colors.windows(2) {
        assert!(pair[0].end <= pair[1].start);
    }
}

#[test]
fn composited_block_has_text_pixels() {
    let mut registry = FontRegistry::new();
    let Some(primary) = registry.first_available() else {
        println!("No fonts available - skipping test (CI environment)");
        return;
    };
    let fonts = FontSet::resolve(&mut registry, primary, 20.0);

    let mut rng = StdRng::seed_from_u64(11);
    let layouts = vec![
        parse_with_rng("&cRed &lbold", true, &fonts, &mut registry, &mut rng),
        parse_with_rng("&kscramble", true, &fonts, &mut registry, &mut rng),
    ];
    let config = RenderConfig::new(Alignment::Center, true, Background::None, &fonts, layouts);

    let offset = config.shadow_offset();
    let width = (config.max_text_width() + offset).ceil() as u32;
    let height = (fonts.size * 3.0 + offset).ceil() as u32;
    let mut image = create_image(width.max(1), height).unwrap();

    Compositor::new().composite(&mut image, &config);

    assert!(image.pixels().any(|p| p[3] > 0));
}

/// Bottom-right corner of the pixels exactly equal to `color`
fn extent_of(image: &RgbaImage, color: Rgba<u8>) -> Option<(u32, u32)> {
    image
        .enumerate_pixels()
        .filter(|(_, _, p)| **p == color)
        .fold(None, |acc, (x, y, _)| match acc {
            None => Some((x, y)),
            Some((mx, my)) => Some((mx.max(x), my.max(y))),
        })
}

fn composite_h(registry: &mut FontRegistry, fonts: &FontSet, shadow: bool) -> RgbaImage {
    let layouts = vec![parse("H", shadow, fonts, registry)];
    let config = RenderConfig::new(Alignment::Left, shadow, Background::None, fonts, layouts);
    let width = (config.max_text_width() + config.shadow_offset()).ceil() as u32 + 8;
    let height = (fonts.size * 2.0).ceil() as u32;
    let mut image = create_image(width, height).unwrap();
    Compositor::new().composite(&mut image, &config);
    image
}

#[test]
fn shadow_sits_under_main_run_offset_by_a_tenth_of_the_size() {
    let mut registry = FontRegistry::new();
    let Some(primary) = registry.first_available() else {
        println!("No fonts available - skipping test (CI environment)");
        return;
    };
    let fonts = FontSet::resolve(&mut registry, primary, 40.0);

    let shadowed = composite_h(&mut registry, &fonts, true);
    let (white_x, white_y) = extent_of(&shadowed, TEXT_COLOR).expect("main run in white");
    let (gray_x, gray_y) = extent_of(&shadowed, SHADOW_COLOR).expect("shadow run in gray");
    assert_eq!((gray_x, gray_y), (white_x + 4, white_y + 4));

    // Every main-run pixel stays white where the shadow overlaps it
    let plain = composite_h(&mut registry, &fonts, false);
    assert_eq!(extent_of(&plain, SHADOW_COLOR), None);
    for (x, y, pixel) in plain.enumerate_pixels() {
        if *pixel == TEXT_COLOR {
            assert_eq!(*shadowed.get_pixel(x, y), TEXT_COLOR, "({x}, {y})");
        }
    }
}
