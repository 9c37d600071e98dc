use svgray::{Error, ImageBuffer};
use tiny_skia::Pixmap;

fn render(text: &str) -> Pixmap {
    let xml = svgray::roxmltree::Document::parse(text).unwrap();
    let mut image = ImageBuffer::new();
    svgray::render(&xml, &mut image).unwrap();
    image.take().unwrap()
}

fn render_err(text: &str) -> Error {
    let xml = svgray::roxmltree::Document::parse(text).unwrap();
    let mut image = ImageBuffer::new();
    svgray::render(&xml, &mut image).unwrap_err()
}

fn rgba(pixmap: &Pixmap, x: u32, y: u32) -> (u8, u8, u8, u8) {
    let p = pixmap.pixel(x, y).unwrap();
    (p.red(), p.green(), p.blue(), p.alpha())
}

fn alpha(pixmap: &Pixmap, x: u32, y: u32) -> u8 {
    pixmap.pixel(x, y).unwrap().alpha()
}

fn assert_near(actual: (u8, u8, u8, u8), expected: (u8, u8, u8, u8), tolerance: u8) {
    let near = |a: u8, b: u8| (a as i16 - b as i16).unsigned_abs() <= tolerance as u16;
    assert!(
        near(actual.0, expected.0)
            && near(actual.1, expected.1)
            && near(actual.2, expected.2)
            && near(actual.3, expected.3),
        "{:?} is not within {} of {:?}",
        actual,
        tolerance,
        expected
    );
}

#[test]
fn image_size_follows_root_viewport() {
    let pixmap = render("<svg width='100' height='50'/>");
    assert_eq!((pixmap.width(), pixmap.height()), (101, 51));

    let pixmap = render("<svg width='99.5' height='10'/>");
    assert_eq!((pixmap.width(), pixmap.height()), (101, 11));

    // No size attributes: the viewBox supplies the viewport.
    let pixmap = render("<svg viewBox='0 0 40 30'/>");
    assert_eq!((pixmap.width(), pixmap.height()), (41, 31));
}

#[test]
fn invalid_root_size_fails() {
    assert!(matches!(
        render_err("<svg width='0' height='100'/>"),
        Error::InvalidSize
    ));
}

#[test]
fn non_svg_root_fails() {
    assert!(matches!(render_err("<html/>"), Error::NotAnSvg));
}

#[test]
fn plain_rect_fill() {
    let pixmap = render(
        "<svg width='100' height='100'>\
         <rect x='10' y='10' width='80' height='80' fill='#ff0000'/>\
         </svg>",
    );

    assert_eq!(rgba(&pixmap, 50, 50), (255, 0, 0, 255));
    assert_eq!(rgba(&pixmap, 12, 12), (255, 0, 0, 255));
    assert_eq!(rgba(&pixmap, 88, 88), (255, 0, 0, 255));
    assert_eq!(alpha(&pixmap, 5, 5), 0);
    assert_eq!(alpha(&pixmap, 95, 95), 0);
    assert_eq!(alpha(&pixmap, 5, 50), 0);
}

#[test]
fn linear_gradient_columns() {
    let pixmap = render(
        "<svg width='100' height='100'>\
         <defs><linearGradient id='g' gradientUnits='userSpaceOnUse' \
         x1='0' y1='0' x2='100' y2='0'>\
         <stop offset='0' stop-color='#ff0000'/>\
         <stop offset='1' stop-color='#0000ff'/>\
         </linearGradient></defs>\
         <rect width='100' height='100' fill='url(#g)'/>\
         </svg>",
    );

    // Columns 0 and 100 are half-covered edge pixels; sample just
    // inside them.
    assert_near(rgba(&pixmap, 1, 50), (252, 0, 3, 255), 3);
    assert_near(rgba(&pixmap, 99, 50), (3, 0, 252, 255), 3);
    assert_near(rgba(&pixmap, 50, 50), (128, 0, 128, 255), 3);
}

#[test]
fn group_opacity_is_a_single_composite() {
    let pixmap = render(
        "<svg width='100' height='100'><g opacity='0.5'>\
         <rect x='10' y='10' width='50' height='50' fill='#ff0000'/>\
         <rect x='40' y='40' width='50' height='50' fill='#0000ff'/>\
         </g></svg>",
    );

    // In the overlap the blue rect fully replaced the red one inside
    // the group buffer before the group opacity applied; a per-element
    // composite would leak red through.
    let overlap = rgba(&pixmap, 50, 50);
    assert_eq!(overlap.0, 0);
    assert_near(overlap, (0, 0, 128, 128), 3);

    assert_near(rgba(&pixmap, 20, 20), (128, 0, 0, 128), 3);
}

#[test]
fn unit_group_opacity_matches_no_attribute() {
    let with = render(
        "<svg width='60' height='60'><g opacity='1'>\
         <circle cx='30' cy='30' r='20' fill='#123456'/>\
         </g></svg>",
    );
    let without = render(
        "<svg width='60' height='60'><g>\
         <circle cx='30' cy='30' r='20' fill='#123456'/>\
         </g></svg>",
    );

    assert_eq!(with.data(), without.data());
}

#[test]
fn cyclic_use_fails() {
    let err = render_err(
        "<svg width='100' height='100' \
         xmlns:xlink='http://www.w3.org/1999/xlink'>\
         <use id='a' xlink:href='#b'/>\
         <use id='b' xlink:href='#a'/>\
         </svg>",
    );
    assert!(matches!(err, Error::CyclicReference));
}

#[test]
fn self_referencing_use_fails() {
    let err = render_err(
        "<svg width='100' height='100'><use id='a' href='#a'/></svg>",
    );
    assert!(matches!(err, Error::CyclicReference));
}

#[test]
fn fatal_errors_commit_no_pixels() {
    // The rect renders before the cyclic reference is discovered; the
    // caller's buffer must still come back untouched.
    let text = "<svg width='50' height='50'>\
                <rect width='50' height='50' fill='#ff0000'/>\
                <use id='a' href='#a'/>\
                </svg>";
    let xml = svgray::roxmltree::Document::parse(text).unwrap();
    let mut image = ImageBuffer::new();

    assert!(matches!(
        svgray::render(&xml, &mut image),
        Err(Error::CyclicReference)
    ));
    assert!(!image.is_size_set());
    assert!(image.take().is_none());
}

#[test]
fn use_renders_referenced_subtree() {
    let pixmap = render(
        "<svg width='100' height='100'>\
         <defs><g id='box'><rect width='10' height='10' fill='#0000ff'/></g></defs>\
         <use x='20' y='30' href='#box'/>\
         </svg>",
    );

    assert_eq!(rgba(&pixmap, 25, 35), (0, 0, 255, 255));
    assert_eq!(alpha(&pixmap, 5, 5), 0);
    assert_eq!(alpha(&pixmap, 25, 50), 0);
}

#[test]
fn missing_use_target_renders_nothing() {
    let pixmap = render(
        "<svg width='50' height='50'><use href='#nope'/>\
         <rect width='10' height='10' fill='#ff0000'/></svg>",
    );

    // Rendering continued past the broken reference.
    assert_eq!(rgba(&pixmap, 5, 5), (255, 0, 0, 255));
}

#[test]
fn markers_fire_at_interior_vertices() {
    let pixmap = render(
        "<svg width='100' height='100'>\
         <defs><marker id='arrow' markerWidth='4' markerHeight='4' orient='auto'>\
         <rect width='4' height='4' fill='#00ff00'/>\
         </marker></defs>\
         <polyline points='10,50 40,50 70,50 90,50' fill='none' \
         marker-mid='url(#arrow)'/>\
         </svg>",
    );

    // Two interior vertices, one marker each, oriented along the path.
    assert_eq!(rgba(&pixmap, 42, 52), (0, 255, 0, 255));
    assert_eq!(rgba(&pixmap, 72, 52), (0, 255, 0, 255));
    assert_eq!(alpha(&pixmap, 12, 52), 0);
    assert_eq!(alpha(&pixmap, 92, 52), 0);
}

#[test]
fn clip_path_circle() {
    let pixmap = render(
        "<svg width='100' height='100'>\
         <defs><clipPath id='c'><circle cx='50' cy='50' r='30'/></clipPath></defs>\
         <rect width='100' height='100' fill='#ff0000' clip-path='url(#c)'/>\
         </svg>",
    );

    assert_eq!(rgba(&pixmap, 50, 50), (255, 0, 0, 255));
    assert_eq!(rgba(&pixmap, 50, 25), (255, 0, 0, 255));
    assert_eq!(alpha(&pixmap, 15, 15), 0);
    assert_eq!(alpha(&pixmap, 85, 85), 0);
}

#[test]
fn nested_svg_viewport_clips() {
    let pixmap = render(
        "<svg width='100' height='100'>\
         <svg x='10' y='10' width='20' height='20'>\
         <rect width='100' height='100' fill='#ff0000' opacity='0.5'/>\
         </svg></svg>",
    );

    assert_near(rgba(&pixmap, 15, 15), (128, 0, 0, 128), 3);
    assert_eq!(alpha(&pixmap, 35, 35), 0);
    assert_eq!(alpha(&pixmap, 5, 15), 0);
}

#[test]
fn mask_luminance() {
    let pixmap = render(
        "<svg width='100' height='100'>\
         <defs><mask id='m'>\
         <rect width='50' height='100' fill='#ffffff'/>\
         </mask></defs>\
         <rect width='100' height='100' fill='#ff0000' mask='url(#m)'/>\
         </svg>",
    );

    assert_near(rgba(&pixmap, 25, 50), (255, 0, 0, 255), 2);
    assert_eq!(alpha(&pixmap, 75, 50), 0);
}

#[test]
fn missing_mask_target_is_fatal() {
    let err = render_err(
        "<svg width='50' height='50'>\
         <rect width='50' height='50' fill='#ff0000' mask='url(#nope)'/>\
         </svg>",
    );
    assert!(matches!(err, Error::MissingMask(ref id) if id == "nope"));
}

#[test]
fn missing_paint_server_without_fallback_is_fatal() {
    let err = render_err(
        "<svg width='50' height='50'>\
         <rect width='50' height='50' fill='url(#nope)'/>\
         </svg>",
    );
    assert!(matches!(err, Error::MissingPaintServer(ref id) if id == "nope"));
}

#[test]
fn missing_paint_server_uses_fallback() {
    let pixmap = render(
        "<svg width='50' height='50'>\
         <rect width='50' height='50' fill='url(#nope) #00ff00'/>\
         </svg>",
    );
    assert_eq!(rgba(&pixmap, 25, 25), (0, 255, 0, 255));
}

#[test]
fn zero_sum_dasharray_matches_no_dasharray() {
    let dashed = render(
        "<svg width='60' height='20'>\
         <line x1='5' y1='10' x2='55' y2='10' stroke='#000000' \
         stroke-width='4' stroke-dasharray='0 0'/>\
         </svg>",
    );
    let plain = render(
        "<svg width='60' height='20'>\
         <line x1='5' y1='10' x2='55' y2='10' stroke='#000000' \
         stroke-width='4'/>\
         </svg>",
    );

    assert_eq!(dashed.data(), plain.data());
}

#[test]
fn odd_dasharray_matches_doubled() {
    let odd = render(
        "<svg width='60' height='20'>\
         <line x1='5' y1='10' x2='55' y2='10' stroke='#000000' \
         stroke-width='4' stroke-dasharray='9 3 6'/>\
         </svg>",
    );
    let even = render(
        "<svg width='60' height='20'>\
         <line x1='5' y1='10' x2='55' y2='10' stroke='#000000' \
         stroke-width='4' stroke-dasharray='9 3 6 9 3 6'/>\
         </svg>",
    );

    assert_eq!(odd.data(), even.data());
}

#[test]
fn fill_rule_star_center() {
    let star = "<svg width='100' height='100'>\
                <path d='M50,10 L79,90 L10,40 L90,40 L21,90 Z' \
                fill='#ff0000' fill-rule='{}'/>\
                </svg>";

    let evenodd = render(&star.replace("{}", "evenodd"));
    assert_eq!(alpha(&evenodd, 50, 50), 0);
    assert_eq!(rgba(&evenodd, 50, 20), (255, 0, 0, 255));

    let nonzero = render(&star.replace("{}", "nonzero"));
    assert_eq!(rgba(&nonzero, 50, 50), (255, 0, 0, 255));
    assert_eq!(rgba(&nonzero, 50, 20), (255, 0, 0, 255));
}

#[test]
fn gradient_pad_spread_clamps_to_edge_colors() {
    let pixmap = render(
        "<svg width='100' height='100'>\
         <defs><linearGradient id='g' gradientUnits='userSpaceOnUse' \
         x1='40' y1='0' x2='60' y2='0'>\
         <stop offset='0' stop-color='#ff0000'/>\
         <stop offset='1' stop-color='#0000ff'/>\
         </linearGradient></defs>\
         <rect width='100' height='100' fill='url(#g)'/>\
         </svg>",
    );

    assert_near(rgba(&pixmap, 10, 50), (255, 0, 0, 255), 2);
    assert_near(rgba(&pixmap, 90, 50), (0, 0, 255, 255), 2);
    assert_near(rgba(&pixmap, 50, 50), (128, 0, 128, 255), 3);
}

#[test]
fn gradient_with_identical_stops_is_flat() {
    let pixmap = render(
        "<svg width='100' height='100'>\
         <defs><linearGradient id='g'>\
         <stop offset='0' stop-color='#ff0000'/>\
         <stop offset='1' stop-color='#ff0000'/>\
         </linearGradient></defs>\
         <rect width='100' height='100' fill='url(#g)'/>\
         </svg>",
    );

    assert_near(rgba(&pixmap, 20, 50), (255, 0, 0, 255), 2);
    assert_near(rgba(&pixmap, 80, 50), (255, 0, 0, 255), 2);
}

#[test]
fn single_stop_gradient_is_a_color() {
    let pixmap = render(
        "<svg width='50' height='50'>\
         <defs><linearGradient id='g'>\
         <stop offset='0' stop-color='#00ff00'/>\
         </linearGradient></defs>\
         <rect width='50' height='50' fill='url(#g)'/>\
         </svg>",
    );
    assert_eq!(rgba(&pixmap, 25, 25), (0, 255, 0, 255));
}

#[test]
fn empty_gradient_paints_nothing() {
    let pixmap = render(
        "<svg width='50' height='50'>\
         <defs><linearGradient id='g'/></defs>\
         <rect width='50' height='50' fill='url(#g)'/>\
         </svg>",
    );
    assert_eq!(alpha(&pixmap, 25, 25), 0);
}

#[test]
fn object_bounding_box_gradient_spans_the_shape() {
    let pixmap = render(
        "<svg width='100' height='100'>\
         <defs><linearGradient id='g'>\
         <stop offset='0' stop-color='#ff0000'/>\
         <stop offset='1' stop-color='#0000ff'/>\
         </linearGradient></defs>\
         <rect x='20' y='20' width='60' height='60' fill='url(#g)'/>\
         </svg>",
    );

    assert_near(rgba(&pixmap, 21, 50), (247, 0, 8, 255), 6);
    assert_near(rgba(&pixmap, 79, 50), (8, 0, 247, 255), 6);
    assert_near(rgba(&pixmap, 50, 50), (128, 0, 128, 255), 3);
}

#[test]
fn display_none_prunes_the_subtree() {
    let pixmap = render(
        "<svg width='50' height='50'>\
         <g display='none'><rect width='50' height='50' fill='#ff0000'/></g>\
         </svg>",
    );
    assert_eq!(alpha(&pixmap, 25, 25), 0);
}

#[test]
fn switch_picks_the_first_viable_child() {
    let pixmap = render(
        "<svg width='50' height='50'><switch>\
         <rect requiredExtensions='http://example.com/ext' width='50' \
         height='50' fill='#ff0000'/>\
         <rect width='50' height='50' fill='#00ff00'/>\
         <rect width='50' height='50' fill='#0000ff'/>\
         </switch></svg>",
    );

    assert_eq!(rgba(&pixmap, 25, 25), (0, 255, 0, 255));
}

#[test]
fn gaussian_blur_softens_edges() {
    let pixmap = render(
        "<svg width='100' height='100'>\
         <defs><filter id='f'><feGaussianBlur stdDeviation='2'/></filter></defs>\
         <rect x='30' y='30' width='40' height='40' fill='#000000' \
         filter='url(#f)'/>\
         </svg>",
    );

    // The center is far from any edge, the rim is feathered outwards.
    assert_eq!(alpha(&pixmap, 50, 50), 255);
    let rim = alpha(&pixmap, 28, 50);
    assert!(rim > 0 && rim < 255, "rim alpha = {}", rim);
    assert_eq!(alpha(&pixmap, 10, 50), 0);
}

#[test]
fn transforms_nest() {
    let pixmap = render(
        "<svg width='100' height='100'>\
         <g transform='translate(10 10)'>\
         <rect transform='scale(2)' width='20' height='20' fill='#ff0000'/>\
         </g></svg>",
    );

    // The rect covers 10..50 in both axes.
    assert_eq!(rgba(&pixmap, 30, 30), (255, 0, 0, 255));
    assert_eq!(rgba(&pixmap, 48, 48), (255, 0, 0, 255));
    assert_eq!(alpha(&pixmap, 55, 30), 0);
    assert_eq!(alpha(&pixmap, 5, 5), 0);
}

#[test]
fn view_box_scales_content() {
    let pixmap = render(
        "<svg width='100' height='100' viewBox='0 0 10 10'>\
         <rect x='2' y='2' width='6' height='6' fill='#ff0000'/>\
         </svg>",
    );

    assert_eq!(rgba(&pixmap, 50, 50), (255, 0, 0, 255));
    assert_eq!(rgba(&pixmap, 25, 25), (255, 0, 0, 255));
    assert_eq!(alpha(&pixmap, 10, 10), 0);
    assert_eq!(alpha(&pixmap, 90, 90), 0);
}

#[test]
fn stroke_only_path() {
    let pixmap = render(
        "<svg width='40' height='40'>\
         <line x1='5' y1='20' x2='35' y2='20' stroke='#0000ff' \
         stroke-width='6' fill='none'/>\
         </svg>",
    );

    assert_eq!(rgba(&pixmap, 20, 20), (0, 0, 255, 255));
    assert_eq!(rgba(&pixmap, 20, 18), (0, 0, 255, 255));
    assert_eq!(alpha(&pixmap, 20, 10), 0);
}

#[test]
fn current_color_resolves_from_the_cascade() {
    let pixmap = render(
        "<svg width='40' height='40' color='#00ff00'>\
         <rect width='40' height='40' fill='currentColor'/>\
         </svg>",
    );
    assert_eq!(rgba(&pixmap, 20, 20), (0, 255, 0, 255));
}

#[test]
fn fill_opacity_applies_to_gradients() {
    let pixmap = render(
        "<svg width='50' height='50'>\
         <defs><linearGradient id='g'>\
         <stop offset='0' stop-color='#ff0000'/>\
         <stop offset='1' stop-color='#ff0000'/>\
         </linearGradient></defs>\
         <rect width='50' height='50' fill='url(#g)' fill-opacity='0.5'/>\
         </svg>",
    );

    let (r, _, _, a) = rgba(&pixmap, 25, 25);
    assert!((a as i16 - 128).abs() <= 3, "alpha = {}", a);
    assert!((r as i16 - 128).abs() <= 3, "premultiplied red = {}", r);
}
