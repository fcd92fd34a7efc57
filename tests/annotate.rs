use image::{Rgb, RgbImage};
use markbox::annotate::{add_border, encode_jpeg, Annotator, RenderOptions};
use markbox::common::{DetBox, Detection};

fn annotator_without_font() -> Annotator {
    // Point at a path that cannot exist so rendering never depends on
    // whatever fonts the host has installed.
    Annotator::new(Some(std::path::Path::new("/nonexistent/font.ttf")))
}

#[test]
fn rendered_image_grows_by_twice_the_border() {
    let image = RgbImage::from_pixel(100, 80, Rgb([0, 0, 0]));
    let annotator = annotator_without_font();
    let opts = RenderOptions::default();

    let rendered = annotator.render(&image, &[], &opts);
    assert_eq!(rendered.dimensions(), (200, 180));
    assert_eq!(*rendered.get_pixel(0, 0), opts.border_color);
}

#[test]
fn box_outline_is_painted_on_all_four_edges() {
    let image = RgbImage::from_pixel(60, 60, Rgb([0, 0, 0]));
    let annotator = annotator_without_font();
    let opts = RenderOptions {
        border_size: 10,
        background_alpha: 0.0,
        ..RenderOptions::default()
    };
    let det = Detection::new(0, "cat", 0.8, DetBox::new(10.0, 20.0, 40.0, 50.0));

    let rendered = annotator.render(&image, &[det], &opts);
    let green = Rgb([0, 255, 0]);
    // Shifted corners: (20, 30) to (50, 60).
    assert_eq!(*rendered.get_pixel(35, 30), green, "top edge");
    assert_eq!(*rendered.get_pixel(35, 60), green, "bottom edge");
    assert_eq!(*rendered.get_pixel(20, 45), green, "left edge");
    assert_eq!(*rendered.get_pixel(50, 45), green, "right edge");
}

#[test]
fn opaque_label_background_overwrites_pixels() {
    let image = RgbImage::from_pixel(80, 80, Rgb([200, 200, 200]));
    let annotator = annotator_without_font();
    let opts = RenderOptions {
        border_size: 0,
        background_color: Rgb([0, 0, 0]),
        background_alpha: 1.0,
        ..RenderOptions::default()
    };
    let det = Detection::new(0, "dog", 0.7, DetBox::new(10.0, 50.0, 70.0, 78.0));

    let rendered = annotator.render(&image, &[det], &opts);
    // The label background sits just above the box's top edge at y = 50.
    assert_eq!(*rendered.get_pixel(12, 38), Rgb([0, 0, 0]));
}

#[test]
fn below_threshold_detections_are_not_drawn() {
    let image = RgbImage::from_pixel(40, 40, Rgb([0, 0, 0]));
    let annotator = annotator_without_font();
    let opts = RenderOptions {
        conf_threshold: 0.5,
        ..RenderOptions::default()
    };
    let faint = Detection::new(0, "bird", 0.3, DetBox::new(5.0, 5.0, 30.0, 30.0));

    let rendered = annotator.render(&image, &[faint], &opts);
    let expected = annotator.render(&image, &[], &opts);
    assert_eq!(rendered, expected);
}

#[test]
fn jpeg_output_decodes_back_to_the_same_dimensions() {
    let image = RgbImage::from_pixel(33, 17, Rgb([90, 10, 10]));
    let bordered = add_border(&image, 4, Rgb([1, 1, 1]));

    let jpeg = encode_jpeg(&bordered).unwrap();
    let decoded = image::load_from_memory(&jpeg).unwrap();
    assert_eq!(decoded.width(), 41);
    assert_eq!(decoded.height(), 25);
}
