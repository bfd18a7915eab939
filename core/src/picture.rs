use image::{GrayImage, Rgb, RgbImage};

/// An image as exchanged between every component of the studio: either a
/// single-channel grayscale buffer or a 3-channel RGB buffer, 8 bits per
/// sample. Dimensions and channel count are fixed per instance; the editing
/// layer replaces pictures wholesale instead of mutating them in place.
#[derive(Debug, Clone)]
pub enum Picture {
    Gray(GrayImage),
    Rgb(RgbImage),
}

impl Picture {
    pub fn width(&self) -> u32 {
        match self {
            Picture::Gray(img) => img.width(),
            Picture::Rgb(img) => img.width(),
        }
    }

    pub fn height(&self) -> u32 {
        match self {
            Picture::Gray(img) => img.height(),
            Picture::Rgb(img) => img.height(),
        }
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width(), self.height())
    }

    pub fn channels(&self) -> u8 {
        match self {
            Picture::Gray(_) => 1,
            Picture::Rgb(_) => 3,
        }
    }

    pub fn is_gray(&self) -> bool {
        matches!(self, Picture::Gray(_))
    }

    pub fn is_color(&self) -> bool {
        matches!(self, Picture::Rgb(_))
    }

    pub fn same_dimensions(&self, other: &Picture) -> bool {
        self.dimensions() == other.dimensions()
    }

    /// Luma view of the picture. Gray input is cloned as-is.
    pub fn to_gray(&self) -> GrayImage {
        match self {
            Picture::Gray(img) => img.clone(),
            Picture::Rgb(img) => image::imageops::grayscale(img),
        }
    }

    /// 3-channel view of the picture. Gray input replicates luma into RGB.
    pub fn to_rgb(&self) -> RgbImage {
        match self {
            Picture::Rgb(img) => img.clone(),
            Picture::Gray(img) => {
                let mut out = RgbImage::new(img.width(), img.height());
                for (src, dst) in img.pixels().zip(out.pixels_mut()) {
                    let g = src[0];
                    *dst = Rgb([g, g, g]);
                }
                out
            }
        }
    }

    /// Applies a grayscale transform to the picture, channel by channel for
    /// RGB input, preserving the channel count of the source.
    pub fn map_channels<F>(&self, f: F) -> Picture
    where
        F: Fn(&GrayImage) -> GrayImage,
    {
        match self {
            Picture::Gray(img) => Picture::Gray(f(img)),
            Picture::Rgb(img) => {
                let [r, g, b] = split_channels(img);
                Picture::Rgb(merge_channels(&f(&r), &f(&g), &f(&b)))
            }
        }
    }

    /// Fallible variant of [`Picture::map_channels`]; the first channel
    /// error aborts the whole transform.
    pub fn try_map_channels<F, E>(&self, f: F) -> Result<Picture, E>
    where
        F: Fn(&GrayImage) -> Result<GrayImage, E>,
    {
        match self {
            Picture::Gray(img) => Ok(Picture::Gray(f(img)?)),
            Picture::Rgb(img) => {
                let [r, g, b] = split_channels(img);
                Ok(Picture::Rgb(merge_channels(&f(&r)?, &f(&g)?, &f(&b)?)))
            }
        }
    }
}

impl PartialEq for Picture {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Picture::Gray(a), Picture::Gray(b)) => {
                a.dimensions() == b.dimensions() && a.as_raw() == b.as_raw()
            }
            (Picture::Rgb(a), Picture::Rgb(b)) => {
                a.dimensions() == b.dimensions() && a.as_raw() == b.as_raw()
            }
            _ => false,
        }
    }
}

impl Eq for Picture {}

impl From<GrayImage> for Picture {
    fn from(img: GrayImage) -> Self {
        Picture::Gray(img)
    }
}

impl From<RgbImage> for Picture {
    fn from(img: RgbImage) -> Self {
        Picture::Rgb(img)
    }
}

/// Splits an RGB buffer into its three planes.
pub fn split_channels(rgb: &RgbImage) -> [GrayImage; 3] {
    let (w, h) = rgb.dimensions();
    let mut r = GrayImage::new(w, h);
    let mut g = GrayImage::new(w, h);
    let mut b = GrayImage::new(w, h);

    for (i, px) in rgb.pixels().enumerate() {
        r.as_mut()[i] = px[0];
        g.as_mut()[i] = px[1];
        b.as_mut()[i] = px[2];
    }

    [r, g, b]
}

/// Recombines three planes into an RGB buffer. All planes must share the
/// dimensions of the first; mismatched planes are truncated to the overlap.
pub fn merge_channels(r: &GrayImage, g: &GrayImage, b: &GrayImage) -> RgbImage {
    let (w, h) = r.dimensions();
    let mut out = RgbImage::new(w, h);

    for (i, px) in out.pixels_mut().enumerate() {
        px[0] = r.as_raw()[i];
        px[1] = *g.as_raw().get(i).unwrap_or(&0);
        px[2] = *b.as_raw().get(i).unwrap_or(&0);
    }

    out
}

/// Builds a solid grayscale picture, mostly useful in tests and as a
/// placeholder frame.
pub fn solid_gray(width: u32, height: u32, value: u8) -> Picture {
    let mut img = GrayImage::new(width, height);
    img.as_mut().fill(value);
    Picture::Gray(img)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_merge_roundtrip() {
        let mut img = RgbImage::new(3, 2);
        img.put_pixel(0, 0, Rgb([10, 20, 30]));
        img.put_pixel(2, 1, Rgb([200, 100, 50]));

        let [r, g, b] = split_channels(&img);
        assert_eq!(r.get_pixel(0, 0)[0], 10);
        assert_eq!(b.get_pixel(2, 1)[0], 50);

        let merged = merge_channels(&r, &g, &b);
        assert_eq!(merged.as_raw(), img.as_raw());
    }

    #[test]
    fn gray_to_rgb_replicates_luma() {
        let pic = solid_gray(4, 4, 77);
        let rgb = pic.to_rgb();
        assert_eq!(rgb.get_pixel(1, 1), &Rgb([77, 77, 77]));
    }

    #[test]
    fn map_channels_preserves_channel_count() {
        let mut img = RgbImage::new(2, 2);
        img.put_pixel(0, 0, Rgb([8, 16, 24]));
        let pic = Picture::Rgb(img);

        let doubled = pic.map_channels(|plane| {
            let mut out = plane.clone();
            out.as_mut().iter_mut().for_each(|v| *v = v.saturating_mul(2));
            out
        });

        assert!(doubled.is_color());
        assert_eq!(doubled.channels(), 3);
        assert!(doubled.same_dimensions(&pic));
        assert_eq!(doubled.to_rgb().get_pixel(0, 0), &Rgb([16, 32, 48]));
    }

    #[test]
    fn picture_equality_compares_pixels() {
        let a = solid_gray(5, 5, 128);
        let b = solid_gray(5, 5, 128);
        let c = solid_gray(5, 5, 129);
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_ne!(a, Picture::Rgb(a.to_rgb()));
    }

    #[test]
    fn to_gray_of_gray_is_identity() {
        let pic = solid_gray(6, 3, 42);
        assert_eq!(pic.to_gray().as_raw(), pic.to_gray().as_raw());
        assert_eq!(pic.to_gray().get_pixel(5, 2)[0], 42);
    }

    #[test]
    fn luma_conversion_uses_picture_dimensions() {
        let mut img = RgbImage::new(7, 4);
        img.put_pixel(3, 3, Rgb([255, 255, 255]));
        let pic = Picture::Rgb(img);
        let gray = pic.to_gray();
        assert_eq!(gray.dimensions(), (7, 4));
        assert_eq!(gray.get_pixel(3, 3)[0], 255);
        assert_eq!(gray.get_pixel(0, 0)[0], 0);
    }
}
