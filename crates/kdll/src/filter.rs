//! Feature-descriptor records describing one combined-kernel request.
//!
//! The cache never interprets a filter: it hashes the raw bytes, compares
//! them for equality and copies them around. The typed enums below exist for
//! the callers building filters and for readable log output.

use std::fmt;

use bytemuck::{Pod, Zeroable};

use crate::hash::simple_hash;

/// Raw field value for features that are switched off.
pub const DISABLED: i32 = -1;

macro_rules! filter_enum {
    ($(#[$meta:meta])* $name:ident { $($variant:ident = $value:expr => $label:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[repr(i32)]
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
        pub enum $name {
            $($variant = $value),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub const fn name(self) -> &'static str {
                match self {
                    $($name::$variant => $label),+
                }
            }

            #[inline]
            pub const fn raw(self) -> i32 {
                self as i32
            }

            pub fn from_raw(raw: i32) -> Option<Self> {
                match raw {
                    $(v if v == $value => Some($name::$variant),)+
                    _ => None,
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.name())
            }
        }

        impl From<$name> for i32 {
            #[inline]
            fn from(value: $name) -> Self {
                value.raw()
            }
        }
    };
}

filter_enum! {
    /// Role of a surface in the composition.
    Layer {
        Invalid = -2 => "Invalid",
        None = -1 => "None",
        Background = 0 => "Background",
        MainVideo = 1 => "Main Video",
        SubVideo = 2 => "Sub-Video",
        SubPicture1 = 3 => "Sub-Picture 1",
        SubPicture2 = 4 => "Sub-Picture 2",
        SubPicture3 = 5 => "Sub-Picture 3",
        SubPicture4 = 6 => "Sub-Picture 4",
        Graphics = 7 => "Graphics",
        RenderTarget = 8 => "Render Target",
    }
}

filter_enum! {
    /// Pixel format of a layer.
    Format {
        Invalid = -3 => "Invalid",
        Any = -2 => "Any",
        None = -1 => "None",
        A8R8G8B8 = 1 => "ARGB",
        X8R8G8B8 = 2 => "RGB",
        A8B8G8R8 = 3 => "ABGR",
        X8B8G8R8 = 4 => "BGR",
        A16B16G16R16 = 5 => "A16B16G16R16",
        A16R16G16B16 = 6 => "A16R16G16B16",
        R5G6B5 = 7 => "RGB16",
        R8G8B8 = 8 => "RGB24",
        R10G10B10A2 = 9 => "R10G10B10A2",
        B10G10R10A2 = 10 => "B10G10R10A2",
        Rgbp = 11 => "RGBP",
        Bgrp = 12 => "BGRP",
        Yuy2 = 20 => "YUY2",
        Yuyv = 21 => "YUYV",
        Yvyu = 22 => "YVYU",
        Uyvy = 23 => "UYVY",
        Vyuy = 24 => "VYUY",
        Ayuv = 25 => "AYUV",
        Y416 = 26 => "Y416",
        Nv12 = 40 => "NV12",
        Nv21 = 41 => "NV21",
        Nv11 = 42 => "NV11",
        P208 = 43 => "P208",
        P010 = 44 => "P010",
        P016 = 45 => "P016",
        Imc1 = 60 => "IMC1",
        Imc2 = 61 => "IMC2",
        Imc3 = 62 => "IMC3",
        Imc4 = 63 => "IMC4",
        Format422H = 64 => "422H",
        Format422V = 65 => "422V",
        Format444P = 66 => "444P",
        Format411P = 67 => "411P",
        I420 = 68 => "I420",
        Iyuv = 69 => "IYUV",
        Yv12 = 70 => "YV12",
        Yvu9 = 71 => "YVU9",
        Ai44 = 80 => "AI44",
        Ia44 = 81 => "IA44",
        P8 = 82 => "P8",
        A8P8 = 83 => "A8P8",
        A8 = 84 => "A8",
        L8 = 85 => "L8",
        L16 = 86 => "L16",
        R32F = 87 => "R32F",
    }
}

/// Memory layout family used to decide whether two formats are interchangeable.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FormatGroup {
    Packed,
    Planar2,
    Planar3,
    Rgb,
    Other,
}

impl Format {
    pub const fn group(self) -> FormatGroup {
        use Format::*;
        match self {
            Yuy2 | Yuyv | Yvyu | Uyvy | Vyuy | Ayuv | Y416 => FormatGroup::Packed,
            Nv12 | Nv21 | Nv11 | P208 | P010 | P016 => FormatGroup::Planar2,
            Imc1 | Imc2 | Imc3 | Imc4 | Format422H | Format422V | Format444P | Format411P | I420 | Iyuv | Yv12 | Yvu9 => {
                FormatGroup::Planar3
            }
            A8R8G8B8 | X8R8G8B8 | A8B8G8R8 | X8B8G8R8 | A16B16G16R16 | A16R16G16B16 | R5G6B5 | R8G8B8 | R10G10B10A2
            | B10G10R10A2 => FormatGroup::Rgb,
            _ => FormatGroup::Other,
        }
    }

    /// Two formats are of the same type when they share a layout family.
    pub const fn same_format_type(self, other: Format) -> bool {
        self.group() as u8 == other.group() as u8
    }
}

filter_enum! {
    /// Color space of a layer or of the render target.
    ColorSpace {
        None = 0 => "None",
        Source = 1 => "Current layer",
        Any = 2 => "Any",
        Rgb = 3 => "RGB",
        Yuv = 4 => "YUV",
        Srgb = 5 => "sRGB",
        Bt601 = 6 => "BT.601",
        Bt601FullRange = 7 => "BT.601_FullRange",
        Bt709 = 8 => "BT.709",
        Bt709FullRange = 9 => "BT.709_FullRange",
        XvYcc601 = 10 => "xvYCC.601",
        XvYcc709 = 11 => "xvYCC.709",
        Bt601Gray = 12 => "BT.601Gray",
        Bt601GrayFullRange = 13 => "BT.601Gray_FullRange",
        Bt2020 = 14 => "BT.2020",
        Bt2020Rgb = 15 => "BT.2020_RGB",
    }
}

impl Default for ColorSpace {
    fn default() -> Self {
        ColorSpace::None
    }
}

filter_enum! {
    /// Sampling mode applied to a layer.
    Sampling {
        None = 0 => "No Sampling",
        Source = 1 => "Current layer",
        Any = 2 => "Any Sampling",
        ScalingAny = 3 => "Any Scale",
        Scaling = 4 => "Scale",
        Scaling034x = 5 => "0.34x",
        ScalingAvs = 6 => "AVS",
        IScaling = 7 => "iScale",
        IScaling034x = 8 => "0.34x iScaling",
        IScalingAvs = 9 => "iAVS",
    }
}

filter_enum! {
    Rotation {
        Identity = 0 => "0",
        Rotate90 = 1 => "90",
        Rotate180 = 2 => "180",
        Rotate270 = 3 => "270",
        MirrorHorizontal = 4 => "Horizontal",
        MirrorVertical = 5 => "Vertical",
        Rotate90MirrorVertical = 6 => "90 Mirror Vertical",
        Rotate90MirrorHorizontal = 7 => "90 Mirror Horizontal",
    }
}

filter_enum! {
    /// Blending or enhancement step applied to a layer.
    Processing {
        None = 0 => "No processing",
        Source = 1 => "Current layer",
        Any = 2 => "Any processing",
        Composite = 3 => "Composite",
        XorComposite = 4 => "XOR Mono Composite",
        ConstBlend = 5 => "Const Blend",
        SourceBlend = 6 => "Source Blend",
        SourceBlend4Bits = 7 => "Source Blend 4-bits",
        PartBlend = 8 => "Part Blend",
        ConstSourceBlend = 9 => "ConstSource Blend",
        ConstPartBlend = 10 => "ConstPart Blend",
        Deinterlace = 11 => "DI",
        Denoise = 12 => "DN",
        DenoiseDeinterlace = 13 => "DNDI",
    }
}

/// One feature-descriptor record.
///
/// Every field is a raw `i32` so the record is padding-free plain old data;
/// equality of two filters is byte equality.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Pod, Zeroable)]
pub struct FilterEntry {
    pub layer: i32,
    pub format: i32,
    pub cspace: i32,
    pub sampling: i32,
    pub luma_key: i32,
    pub procamp: i32,
    /// CSC coefficient matrix id.
    pub matrix: i32,
    pub process: i32,
    pub rotation: i32,
    pub chroma_siting: i32,
    pub dither: i32,
    pub const_out_alpha: i32,
}

impl FilterEntry {
    pub const fn new(layer: Layer, format: Format) -> Self {
        Self {
            layer: layer.raw(),
            format: format.raw(),
            cspace: ColorSpace::None.raw(),
            sampling: Sampling::None.raw(),
            luma_key: DISABLED,
            procamp: DISABLED,
            matrix: DISABLED,
            process: Processing::None.raw(),
            rotation: Rotation::Identity.raw(),
            chroma_siting: DISABLED,
            dither: 0,
            const_out_alpha: 0,
        }
    }

    #[must_use]
    pub const fn with_cspace(mut self, cspace: ColorSpace) -> Self {
        self.cspace = cspace.raw();
        self
    }

    #[must_use]
    pub const fn with_sampling(mut self, sampling: Sampling) -> Self {
        self.sampling = sampling.raw();
        self
    }

    #[must_use]
    pub const fn with_rotation(mut self, rotation: Rotation) -> Self {
        self.rotation = rotation.raw();
        self
    }

    #[must_use]
    pub const fn with_process(mut self, process: Processing) -> Self {
        self.process = process.raw();
        self
    }

    #[must_use]
    pub const fn with_procamp(mut self, procamp: i32) -> Self {
        self.procamp = procamp;
        self
    }

    #[must_use]
    pub const fn with_luma_key(mut self, luma_key: i32) -> Self {
        self.luma_key = luma_key;
        self
    }

    #[must_use]
    pub const fn with_matrix(mut self, matrix: i32) -> Self {
        self.matrix = matrix;
        self
    }

    #[must_use]
    pub const fn with_dither(mut self, enabled: bool) -> Self {
        self.dither = enabled as i32;
        self
    }

    #[must_use]
    pub const fn with_const_out_alpha(mut self, enabled: bool) -> Self {
        self.const_out_alpha = enabled as i32;
        self
    }

    pub fn layer(&self) -> Option<Layer> {
        Layer::from_raw(self.layer)
    }

    pub fn format(&self) -> Option<Format> {
        Format::from_raw(self.format)
    }

    pub fn cspace(&self) -> Option<ColorSpace> {
        ColorSpace::from_raw(self.cspace)
    }

    pub fn sampling(&self) -> Option<Sampling> {
        Sampling::from_raw(self.sampling)
    }

    pub fn rotation(&self) -> Option<Rotation> {
        Rotation::from_raw(self.rotation)
    }

    pub fn process(&self) -> Option<Processing> {
        Processing::from_raw(self.process)
    }
}

struct Named<T>(Option<T>, i32);

impl<T: fmt::Display> fmt::Display for Named<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0 {
            Some(value) => fmt::Display::fmt(value, f),
            None => write!(f, "?{}", self.1),
        }
    }
}

impl fmt::Display for FilterEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{} {} {} {} rot={} {}",
            Named(self.layer(), self.layer),
            Named(self.format(), self.format),
            Named(self.cspace(), self.cspace),
            Named(self.sampling(), self.sampling),
            Named(self.rotation(), self.rotation),
            Named(self.process(), self.process),
        )?;
        if self.procamp != DISABLED {
            write!(f, " procamp={}", self.procamp)?;
        }
        if self.luma_key != DISABLED {
            write!(f, " lumakey={}", self.luma_key)?;
        }
        if self.matrix != DISABLED {
            write!(f, " csc={}", self.matrix)?;
        }
        f.write_str("]")
    }
}

/// Borrowed filter that formats as a space separated list of its entries.
pub struct DisplayFilter<'a>(pub &'a [FilterEntry]);

impl fmt::Display for DisplayFilter<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, entry) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            fmt::Display::fmt(entry, f)?;
        }
        Ok(())
    }
}

/// Size in bytes of one filter record.
pub const FILTER_ENTRY_SIZE: usize = std::mem::size_of::<FilterEntry>();

#[inline]
pub fn filter_bytes(filter: &[FilterEntry]) -> &[u8] {
    bytemuck::cast_slice(filter)
}

/// Hash of the raw filter bytes, the key used by
/// [`KernelCache::find_combined_kernel`](crate::KernelCache::find_combined_kernel).
#[inline]
pub fn filter_hash(filter: &[FilterEntry]) -> u32 {
    simple_hash(filter_bytes(filter))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_values_round_trip() {
        for layer in Layer::ALL {
            assert_eq!(Layer::from_raw(layer.raw()), Some(*layer));
        }
        for format in Format::ALL {
            assert_eq!(Format::from_raw(i32::from(*format)), Some(*format));
        }
        assert_eq!(Rotation::from_raw(42), None);
    }

    #[test]
    fn same_format_type_groups_layouts() {
        assert!(Format::Nv12.same_format_type(Format::P010));
        assert!(Format::Yuy2.same_format_type(Format::Ayuv));
        assert!(Format::Yv12.same_format_type(Format::I420));
        assert!(Format::A8R8G8B8.same_format_type(Format::R5G6B5));
        assert!(!Format::Nv12.same_format_type(Format::Yv12));
        assert!(!Format::A8R8G8B8.same_format_type(Format::Yuy2));
        assert!(Format::P8.same_format_type(Format::Any));
    }

    #[test]
    fn filter_entries_are_padding_free() {
        assert_eq!(FILTER_ENTRY_SIZE, 12 * std::mem::size_of::<i32>());
        let filter = [FilterEntry::new(Layer::MainVideo, Format::Nv12); 3];
        assert_eq!(filter_bytes(&filter).len(), 3 * FILTER_ENTRY_SIZE);
    }

    #[test]
    fn hash_tracks_every_field() {
        let base = FilterEntry::new(Layer::MainVideo, Format::Nv12).with_sampling(Sampling::ScalingAvs);
        let rotated = base.with_rotation(Rotation::Rotate90);
        assert_ne!(filter_hash(&[base]), filter_hash(&[rotated]));
        assert_eq!(filter_hash(&[base]), filter_hash(&[base]));
    }

    #[test]
    fn display_names_known_and_unknown_values() {
        let entry = FilterEntry::new(Layer::MainVideo, Format::Nv12)
            .with_cspace(ColorSpace::Bt709)
            .with_sampling(Sampling::ScalingAvs)
            .with_process(Processing::Composite)
            .with_procamp(0);
        assert_eq!(entry.to_string(), "[Main Video NV12 BT.709 AVS rot=0 Composite procamp=0]");

        let mut odd = FilterEntry::new(Layer::RenderTarget, Format::A8R8G8B8);
        odd.sampling = 99;
        assert_eq!(
            DisplayFilter(&[odd]).to_string(),
            "[Render Target ARGB None ?99 rot=0 No processing]"
        );
    }
}
