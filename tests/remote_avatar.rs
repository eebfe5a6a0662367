//! Avatars fetched over HTTP and relative to the transcript base
#![cfg(feature = "remote-avatars")]

use chatsnap::block::{parse_fragment, Avatar, NormalizedBlock};
use chatsnap::rendering::avatar::AvatarLoader;
use chatsnap::rendering::paint::Rgba;
use chatsnap::rendering::{BlockPainter, Container, RasterBackend, RenderOptions};
use chatsnap::SnapConfig;
use std::io::Cursor;
use std::sync::Once;
use tiny_http::{Response, Server};

static INIT: Once = Once::new();

fn avatar_png() -> Vec<u8> {
    let img = image::RgbaImage::from_pixel(4, 4, image::Rgba([200, 30, 30, 255]));
    let mut bytes = Cursor::new(Vec::new());
    img.write_to(&mut bytes, image::ImageFormat::Png).unwrap();
    bytes.into_inner()
}

fn start_test_server() -> String {
    INIT.call_once(|| {
        std::thread::spawn(|| {
            let server = Server::http("127.0.0.1:18093").unwrap();
            let png = avatar_png();
            for request in server.incoming_requests() {
                if request.url().ends_with("/thumbnail/alice.png") {
                    let resp = Response::from_data(png.clone()).with_header(
                        "Content-Type: image/png".parse::<tiny_http::Header>().unwrap(),
                    );
                    let _ = request.respond(resp);
                } else {
                    let _ = request.respond(Response::empty(404));
                }
            }
        });
        std::thread::sleep(std::time::Duration::from_millis(100));
    });

    "http://127.0.0.1:18093".to_string()
}

fn pixel(p: &tiny_skia::Pixmap, x: u32, y: u32) -> [u8; 4] {
    let c = p.pixel(x, y).unwrap().demultiply();
    [c.red(), c.green(), c.blue(), c.alpha()]
}

fn render_with_avatar(painter: &BlockPainter, src: &str) -> tiny_skia::Pixmap {
    let mut container = Container::from_config(&SnapConfig::default()).unwrap();
    container.attach(vec![NormalizedBlock {
        id: 0,
        is_user: false,
        background: "#202020".into(),
        avatar: Some(Avatar {
            src: src.to_string(),
            side: 50.0,
        }),
        body: parse_fragment("<p>hi</p>"),
    }]);
    painter
        .rasterize(
            &container,
            &RenderOptions {
                scale: 2.0,
                background: Rgba::BLACK,
            },
        )
        .unwrap()
}

#[test]
fn relative_avatar_resolves_against_remote_base() {
    let base = start_test_server();
    let loader = AvatarLoader::new(Some(format!("{}/chats/", base)));
    let img = loader.load("../thumbnail/alice.png").expect("avatar fetched");
    assert_eq!(img.dimensions(), (4, 4));
}

#[test]
fn fetched_avatar_is_painted() {
    let base = start_test_server();
    let painter = BlockPainter::new(None, AvatarLoader::new(None));
    let p = render_with_avatar(&painter, &format!("{}/thumbnail/alice.png", base));
    assert_eq!(pixel(&p, 114, 114), [200, 30, 30, 255]);
}

#[test]
fn missing_remote_avatar_falls_back_to_holder() {
    let base = start_test_server();
    let painter = BlockPainter::new(None, AvatarLoader::new(None));
    let p = render_with_avatar(&painter, &format!("{}/thumbnail/nobody.png", base));
    assert_eq!(pixel(&p, 114, 114), [0x66, 0x66, 0x66, 255]);
}
