use crate::{data_structures::texture::Bitmap, error::Result};

/// Decodes an encoded image into tightly packed RGBA8. The mime type, when
/// known, spares the decoder from guessing the container.
pub fn decode_bitmap(bytes: &[u8], mime_type: Option<&str>) -> Result<Bitmap> {
    let format = mime_type.and_then(image::ImageFormat::from_mime_type);
    let img = match format {
        Some(format) => image::load_from_memory_with_format(bytes, format)?,
        None => image::load_from_memory(bytes)?,
    };
    let rgba = img.to_rgba8();
    let (width, height) = rgba.dimensions();
    Ok(Bitmap::new(width, height, rgba.into_raw()))
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    #[test]
    fn decodes_png_to_rgba() {
        let source = image::RgbImage::from_pixel(3, 2, image::Rgb([10, 20, 30]));
        let mut png = Vec::new();
        source
            .write_to(&mut Cursor::new(&mut png), image::ImageFormat::Png)
            .unwrap();

        let bitmap = decode_bitmap(&png, Some("image/png")).unwrap();
        assert_eq!((bitmap.width, bitmap.height), (3, 2));
        assert_eq!(&bitmap.pixels[..4], &[10, 20, 30, 255]);
        assert_eq!(bitmap.pixels.len(), 3 * 2 * 4);
    }

    #[test]
    fn garbage_is_a_parse_error() {
        let err = decode_bitmap(b"not an image", None).unwrap_err();
        assert_eq!(err.code(), -3);
    }
}
