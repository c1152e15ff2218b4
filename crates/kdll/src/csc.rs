//! Color-space-conversion parameters stored alongside each combined kernel.

use bytemuck::{Pod, Zeroable};

use crate::filter::{ColorSpace, DISABLED};

/// Maximum number of CSC matrices a combined kernel can carry.
pub const CSC_MAX_MATRICES: usize = 6;

/// One 3x4 color conversion matrix and the conversion it implements.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct CscMatrix {
    pub input: i32,
    pub output: i32,
    /// Coefficient id referenced by filter entries, [`DISABLED`] when unused.
    pub coeff_id: i32,
    pub patch_id: i32,
    pub coeff: [f32; 12],
}

impl CscMatrix {
    pub const IDENTITY: [f32; 12] = [1.0, 0.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 1.0, 0.0];

    pub fn new(input: ColorSpace, output: ColorSpace, coeff_id: i32, coeff: [f32; 12]) -> Self {
        Self {
            input: input.raw(),
            output: output.raw(),
            coeff_id,
            patch_id: DISABLED,
            coeff,
        }
    }
}

impl Default for CscMatrix {
    fn default() -> Self {
        Self::new(ColorSpace::None, ColorSpace::None, DISABLED, Self::IDENTITY)
    }
}

/// CSC parameter block copied byte-for-byte into the kernel's cache slot.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct CscParams {
    pub matrices: [CscMatrix; CSC_MAX_MATRICES],
    /// Number of leading entries of `matrices` in use.
    pub active: u32,
    /// Matrix patched into the kernel binary, or `u32::MAX` for none.
    pub patch_matrix: u32,
}

impl Default for CscParams {
    fn default() -> Self {
        Self {
            matrices: [CscMatrix::default(); CSC_MAX_MATRICES],
            active: 0,
            patch_matrix: u32::MAX,
        }
    }
}

impl CscParams {
    pub const SIZE: usize = std::mem::size_of::<CscParams>();

    pub fn push(&mut self, matrix: CscMatrix) -> bool {
        let index = self.active as usize;
        if index >= CSC_MAX_MATRICES {
            return false;
        }
        self.matrices[index] = matrix;
        self.active += 1;
        true
    }

    pub fn active_matrices(&self) -> &[CscMatrix] {
        &self.matrices[..(self.active as usize).min(CSC_MAX_MATRICES)]
    }

    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::bytes_of(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_stops_at_capacity() {
        let mut params = CscParams::default();
        for id in 0..CSC_MAX_MATRICES as i32 {
            assert!(params.push(CscMatrix::new(ColorSpace::Bt709, ColorSpace::Srgb, id, CscMatrix::IDENTITY)));
        }
        assert!(!params.push(CscMatrix::default()));
        assert_eq!(params.active_matrices().len(), CSC_MAX_MATRICES);
        assert_eq!(params.active_matrices()[3].coeff_id, 3);
    }

    #[test]
    fn parameter_block_has_no_padding() {
        assert_eq!(CscParams::SIZE, CSC_MAX_MATRICES * 64 + 8);
        assert_eq!(CscParams::default().as_bytes().len(), CscParams::SIZE);
    }
}
