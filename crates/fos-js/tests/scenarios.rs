//! End-to-end host scenarios
//!
//! Scripts run through the queue and the run loop exactly as a project
//! would; frames are driven from the test thread.

use std::fs;
use std::io::Cursor;
use std::path::Path;
use std::thread;

use base64::Engine as _;
use fos_js::*;
use fos_text::Font;
use fos_text::testing::test_font;

fn headless(dir: &Path) -> Host {
    let config = HostConfig::new(dir).without_font().with_screen_size(40, 30);
    Host::new(config).unwrap()
}

fn host() -> Host {
    headless(&std::env::temp_dir())
}

fn run(host: &mut Host, name: &str, source: &str) {
    host.enqueue_source(name, source);
    host.run_until_idle().unwrap();
}

fn png_data_url(width: u32, height: u32, rgba: &[u8]) -> String {
    let image = image::RgbaImage::from_raw(width, height, rgba.to_vec()).unwrap();
    let mut png = Cursor::new(Vec::new());
    image.write_to(&mut png, image::ImageFormat::Png).unwrap();
    let encoded = base64::engine::general_purpose::STANDARD.encode(png.into_inner());
    format!("data:image/png;base64,{encoded}")
}

// ============================================================================
// DRAWING BRIDGE
// ============================================================================

#[test]
fn test_fill_then_read_back_black() {
    let mut host = host();
    run(
        &mut host,
        "fill.js",
        r#"
        var h = _fos_newSurface(10, 10);
        _fos_fillRect(h, 0, 0, 10, 10, 0x000000ff);
        var pixels = Array.from(_fos_readPixels(h, 0, 0, 10, 10));
        "#,
    );
    let pixels: Vec<u8> = host.evaluate("pixels").unwrap();
    assert_eq!(pixels.len(), 400);
    for pixel in pixels.chunks(4) {
        assert_eq!(pixel, [0, 0, 0, 255]);
    }
}

#[test]
fn test_png_data_url_draws_exactly() {
    let source = [
        255, 0, 0, 255, 0, 255, 0, 255, //
        0, 0, 255, 255, 12, 34, 56, 255,
    ];
    let url = png_data_url(2, 2, &source);
    let mut host = host();
    run(
        &mut host,
        "image.js",
        &format!(
            r#"
            var img = new Image();
            img.src = '{url}';
            var c = document.createElement('canvas');
            c.width = 2;
            c.height = 2;
            var g = c.getContext('2d');
            g.drawImage(img, 0, 0);
            var pixels = Array.from(g.getImageData(0, 0, 2, 2).data);
            "#
        ),
    );
    let pixels: Vec<u8> = host.evaluate("pixels").unwrap();
    assert_eq!(pixels, source);
}

#[test]
fn test_bad_data_url_throws_into_script() {
    let mut host = host();
    run(
        &mut host,
        "bad.js",
        r#"
        var message = '';
        try {
            new Image().src = 'data:image/png;base64,AAAA';
        } catch (e) {
            message = e.message;
        }
        "#,
    );
    let message: String = host.evaluate("message").unwrap();
    assert!(message.starts_with("cannot decode image"), "{message}");
}

#[test]
fn test_unknown_composite_mode_throws() {
    let mut host = host();
    run(
        &mut host,
        "modes.js",
        r#"
        var c = document.createElement('canvas');
        c.width = 2; c.height = 2;
        var g = c.getContext('2d');
        g.globalCompositeOperation = 'multiply';
        g.drawImage(c, 0, 0);
        g.globalCompositeOperation = 'hue';
        var message = '';
        try { g.drawImage(c, 0, 0); } catch (e) { message = e.message; }
        "#,
    );
    let message: String = host.evaluate("message").unwrap();
    assert_eq!(message, "not supported composite mode: hue");
}

#[test]
fn test_read_outside_surface_is_invalid_argument() {
    let mut host = host();
    run(
        &mut host,
        "oob.js",
        r#"
        var h = _fos_newSurface(4, 4);
        var message = '';
        try { _fos_readPixels(h, 2, 2, 4, 4); } catch (e) { message = e.message; }
        "#,
    );
    let message: String = host.evaluate("message").unwrap();
    assert!(message.starts_with("invalid argument"), "{message}");
}

// ============================================================================
// HOST OBJECT MODEL
// ============================================================================

#[test]
fn test_lazy_allocation_keeps_handle() {
    let mut host = host();
    run(
        &mut host,
        "lazy.js",
        r#"
        var c = document.createElement('canvas');
        c.width = 10;
        var beforeHeight = c._surface;
        c.height = 5;
        var first = c._surface;
        c.width = 10;
        c.height = 5;
        var kept = first === c._surface;
        "#,
    );
    assert!(host.evaluate::<bool>("beforeHeight === null").unwrap());
    assert!(host.evaluate::<bool>("kept").unwrap());
    assert_eq!(host.surface_count(), 1);

    run(&mut host, "resize.js", "c.width = 20; var resized = first !== c._surface;");
    assert!(host.evaluate::<bool>("resized && c.width === 20").unwrap());
}

#[test]
fn test_save_restore_scopes_fill_style() {
    let mut host = host();
    run(
        &mut host,
        "state.js",
        r#"
        var c = document.createElement('canvas');
        c.width = 1; c.height = 1;
        var g = c.getContext('2d');
        g.fillStyle = '#ff0000';
        g.save();
        g.fillStyle = '#0000ff';
        g.globalAlpha = 0.5;
        g.restore();
        g.restore();
        g.fillRect(0, 0, 1, 1);
        var pixel = Array.from(g.getImageData(0, 0, 1, 1).data);
        "#,
    );
    let pixel: Vec<u8> = host.evaluate("pixel").unwrap();
    assert_eq!(pixel, [255, 0, 0, 255]);
}

#[test]
fn test_unsupported_event_type_is_fatal_when_uncaught() {
    let mut host = host();
    host.enqueue_source("click.js", "document.addEventListener('click', function() {});");
    let err = host.run_until_idle().unwrap_err();
    match err {
        HostError::ScriptRuntime { script, message, .. } => {
            assert_eq!(script, "click.js");
            assert!(message.contains("not supported event type: click"), "{message}");
        }
        other => panic!("unexpected error {other}"),
    }
}

#[test]
fn test_unknown_element_throws() {
    let mut host = host();
    run(
        &mut host,
        "span.js",
        "var message = ''; try { document.createElement('span'); } catch (e) { message = e.message; }",
    );
    let message: String = host.evaluate("message").unwrap();
    assert_eq!(message, "not supported element: span");
}

#[test]
fn test_local_storage_round_trip() {
    let mut host = host();
    run(
        &mut host,
        "storage.js",
        r#"
        localStorage.setItem('save1', 42);
        localStorage.setItem('config', '{}');
        localStorage.removeItem('config');
        "#,
    );
    let value: String = host.evaluate("localStorage.getItem('save1')").unwrap();
    assert_eq!(value, "42");
    assert!(host.evaluate::<bool>("localStorage.getItem('config') === null").unwrap());
    assert_eq!(host.evaluate::<u32>("localStorage.length").unwrap(), 1);
}

#[test]
fn test_collected_canvas_releases_surface() {
    let mut host = host();
    run(
        &mut host,
        "garbage.js",
        r#"
        var c = document.createElement('canvas');
        c.width = 8; c.height = 8;
        c.getContext('2d').fillRect(0, 0, 8, 8);
        c = null;
        "#,
    );
    host.collect_garbage();
    assert_eq!(host.surface_count(), 0);
}

// ============================================================================
// TEXT
// ============================================================================

fn text_host() -> Host {
    let mut host = host();
    host.set_font(Font::from_bytes(test_font()).unwrap()).unwrap();
    host
}

#[test]
fn test_measure_text_uses_font_size() {
    let mut host = text_host();
    run(
        &mut host,
        "measure.js",
        r#"
        var c = document.createElement('canvas');
        c.width = 40; c.height = 30;
        var g = c.getContext('2d');
        g.font = 'bold 20px GameFont';
        var m = g.measureText('A A');
        "#,
    );
    let size: Vec<u32> = host.evaluate("[m.width, m.height]").unwrap();
    assert_eq!(size, [30, 20]);
}

#[test]
fn test_centered_text_matches_measure() {
    let mut host = text_host();
    run(
        &mut host,
        "center.js",
        r#"
        var c = document.createElement('canvas');
        c.width = 40; c.height = 30;
        var g = c.getContext('2d');
        g.font = '20px GameFont';
        g.textAlign = 'center';
        g.fillText('AA', 20, 20);
        var width = g.measureText('AA').width;
        var alpha = [];
        var data = g.getImageData(0, 0, 40, 30).data;
        for (var i = 3; i < data.length; i += 4) alpha.push(data[i]);
        "#,
    );
    let width: u32 = host.evaluate("width").unwrap();
    let alpha: Vec<u8> = host.evaluate("alpha").unwrap();
    let columns: Vec<usize> = (0..40)
        .filter(|x| (0..30).any(|y| alpha[y * 40 + x] > 0))
        .collect();
    let left = 20 - width as usize / 2;
    let (first, last) = (columns[0], *columns.last().unwrap());
    assert!(first >= left && first <= left + 2, "first column {first}, origin {left}");
    assert!(last < left + width as usize && last + 3 >= left + width as usize, "last column {last}");
}

#[test]
fn test_image_data_is_clamped() {
    let mut host = host();
    run(
        &mut host,
        "image_data.js",
        r#"
        var c = document.createElement('canvas');
        c.width = 2; c.height = 1;
        var g = c.getContext('2d');
        g.fillStyle = '#102030';
        g.fillRect(0, 0, 2, 1);
        var image = g.getImageData(0, 0, 2, 1);
        var clamped = image.data instanceof Uint8ClampedArray;
        image.data[0] = 300;
        image.data[1] = -5;
        "#,
    );
    let clamped: bool = host.evaluate("clamped").unwrap();
    assert!(clamped);
    let data: Vec<u8> = host.evaluate("Array.from(image.data)").unwrap();
    assert_eq!(data, [255, 0, 0x30, 255, 0x10, 0x20, 0x30, 255]);
    let size: Vec<u32> = host.evaluate("[image.width, image.height]").unwrap();
    assert_eq!(size, [2, 1]);
}

#[test]
fn test_text_position_out_of_range_throws() {
    let mut host = text_host();
    run(
        &mut host,
        "far_text.js",
        r#"
        var c = document.createElement('canvas');
        c.width = 4; c.height = 4;
        var g = c.getContext('2d');
        g.font = '20px GameFont';
        var message = '';
        try { g.fillText('A', 4294967306, 20); } catch (e) { message = e.message; }
        g.fillText('A', -2147483648, 20);
        "#,
    );
    let message: String = host.evaluate("message").unwrap();
    assert!(message.contains("out of range"), "{message}");
}

#[test]
fn test_text_requires_alphabetic_baseline() {
    let mut host = text_host();
    run(
        &mut host,
        "baseline.js",
        r#"
        var c = document.createElement('canvas');
        c.width = 4; c.height = 4;
        var g = c.getContext('2d');
        g.textBaseline = 'top';
        var message = '';
        try { g.fillText('A', 0, 0); } catch (e) { message = e.message; }
        "#,
    );
    let message: String = host.evaluate("message").unwrap();
    assert_eq!(message, "not supported textBaseline: top");
}

// ============================================================================
// SCRIPT QUEUE AND CALLBACKS
// ============================================================================

#[test]
fn test_scripts_run_in_queue_order() {
    let dir = tempfile::tempdir().unwrap();
    fs::create_dir(dir.path().join("js")).unwrap();
    fs::write(
        dir.path().join("js/a.js"),
        "var order = ['A']; var s = document.createElement('script'); s.src = 'js/c.js'; document.body.appendChild(s);",
    )
    .unwrap();
    fs::write(dir.path().join("js/b.js"), "order.push('B');").unwrap();
    fs::write(dir.path().join("js/c.js"), "order.push('C');").unwrap();

    let mut host = headless(dir.path());
    assert!(host.enqueue_script("js/a.js"));
    assert!(host.enqueue_script("js/b.js"));
    assert!(!host.enqueue_script("js/libs/pixi.js"));
    host.run_until_idle().unwrap();
    let order: String = host.evaluate("order.join(',')").unwrap();
    assert_eq!(order, "A,B,C");
}

#[test]
fn test_load_callback_finishes_before_next() {
    let dir = tempfile::tempdir().unwrap();
    fs::create_dir(dir.path().join("js")).unwrap();
    fs::write(dir.path().join("js/extra.js"), "order.push('extra');").unwrap();

    let mut host = headless(dir.path());
    run(
        &mut host,
        "main.js",
        r#"
        var order = [];
        window.onload = function() {
            order.push('f1');
            var s = document.createElement('script');
            s.src = 'js/extra.js';
            document.body.appendChild(s);
            order.push('f1 done');
        };
        window.onload = function() { order.push('f2'); };
        "#,
    );
    let order: String = host.evaluate("order.join(',')").unwrap();
    assert_eq!(order, "f1,f1 done,extra,f2");
}

#[test]
fn test_image_onload_is_deferred() {
    let url = png_data_url(1, 1, &[1, 2, 3, 255]);
    let mut host = host();
    run(
        &mut host,
        "onload.js",
        &format!(
            r#"
            var events = [];
            var img = new Image();
            img.onload = function() {{ events.push('loaded ' + this.width); }};
            img.src = '{url}';
            events.push('assigned');
            "#
        ),
    );
    let events: String = host.evaluate("events.join(',')").unwrap();
    assert_eq!(events, "assigned,loaded 1");
}

#[test]
fn test_missing_script_file_stops_the_loop() {
    let dir = tempfile::tempdir().unwrap();
    let mut host = headless(dir.path());
    host.enqueue_script("js/main.js");
    assert!(matches!(host.run_until_idle(), Err(HostError::Io { .. })));
}

#[test]
fn test_data_files_load_as_json() {
    let dir = tempfile::tempdir().unwrap();
    fs::create_dir(dir.path().join("data")).unwrap();
    fs::write(dir.path().join("data/System.json"), r#"{"gameTitle": "Demo"}"#).unwrap();
    fs::write(dir.path().join("data/Broken.json"), "{").unwrap();

    let mut host = headless(dir.path());
    run(
        &mut host,
        "data.js",
        r#"
        var title = _fos_loadData('data/System.json').gameTitle;
        var errors = [];
        ['data/Missing.json', 'data/Broken.json', '../escape.json'].forEach(function(path) {
            try { _fos_loadData(path); } catch (e) { errors.push(e.message.split(' ')[0]); }
        });
        "#,
    );
    assert_eq!(host.evaluate::<String>("title").unwrap(), "Demo");
    assert_eq!(host.evaluate::<String>("errors.join(',')").unwrap(), "cannot,malformed,invalid");
}

#[test]
fn test_frame_callbacks_use_snapshot() {
    let mut host = host();
    run(
        &mut host,
        "raf.js",
        r#"
        var calls = [];
        function tick(n) {
            return function(time) {
                calls.push(n);
                requestAnimationFrame(tick(n + 1));
            };
        }
        requestAnimationFrame(tick(1));
        "#,
    );
    host.run_frame(&[]).unwrap();
    assert_eq!(host.evaluate::<String>("calls.join(',')").unwrap(), "1");
    host.run_frame(&[]).unwrap();
    assert_eq!(host.evaluate::<String>("calls.join(',')").unwrap(), "1,2");
}

// ============================================================================
// FRAME HANDOFF
// ============================================================================

#[test]
fn test_render_thread_handoff() {
    let (render, link) = frame_channel();
    let script = thread::spawn(move || -> Result<u32> {
        let mut host = headless(&std::env::temp_dir());
        host.enqueue_source(
            "game.js",
            r#"
            var frames = 0;
            var keys = [];
            var c = document.createElement('canvas');
            c.width = 40; c.height = 30;
            document.body.appendChild(c);
            var g = c.getContext('2d');
            document.addEventListener('keydown', function(e) { keys.push(e.keyCode); });
            function update() {
                frames++;
                g.fillStyle = frames % 2 ? '#ffffff' : '#000000';
                g.fillRect(0, 0, 40, 30);
                requestAnimationFrame(update);
            }
            requestAnimationFrame(update);
            "#,
        );
        host.run(&link)?;
        host.evaluate::<u32>("frames * 1000 + keys[0]")
    });

    let first = render
        .frame(FrameStart {
            events: vec![InputEvent::KeyDown { key_code: 32 }],
        })
        .unwrap();
    assert_eq!((first.width, first.height), (40, 30));
    assert_eq!(first.pixels.len(), 40 * 30 * 4);
    assert_eq!(&first.pixels[..4], &[255, 255, 255, 255]);

    let second = render.frame(FrameStart::default()).unwrap();
    assert_eq!(&second.pixels[..4], &[0, 0, 0, 255]);

    drop(render);
    assert_eq!(script.join().unwrap().unwrap(), 2032);
}
