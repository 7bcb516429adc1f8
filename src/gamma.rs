// sRGB <-> linear lookup tables, used when compositing the drawing surface
// (which may carry partial alpha after a refinement) onto the window.
// Visual: antialiased edges blend without dark fringes.

pub struct GammaLut {
    // sRGB(0..255) -> linear (0..1)
    srgb_to_linear: [f32; 256],
    // linear(0..1) -> sRGB(0..255), quantized to 4096 steps
    linear_to_srgb: [u8; 4096],
}

impl GammaLut {
    /// Build both tables once at startup.
    pub fn new() -> Self {
        let mut s2l = [0.0f32; 256];
        for (v, slot) in s2l.iter_mut().enumerate() {
            let c = v as f32 / 255.0;
            *slot = if c <= 0.04045 { c / 12.92 } else { ((c + 0.055) / 1.055).powf(2.4) };
        }

        let mut l2s = [0u8; 4096];
        for (i, slot) in l2s.iter_mut().enumerate() {
            let l = i as f32 / 4095.0;
            let s = if l <= 0.003_130_8 { 12.92 * l } else { 1.055 * l.powf(1.0 / 2.4) - 0.055 };
            *slot = (s * 255.0).round().clamp(0.0, 255.0) as u8;
        }

        Self { srgb_to_linear: s2l, linear_to_srgb: l2s }
    }

    #[inline]
    pub fn srgb_u8_to_linear(&self, v: u8) -> f32 {
        self.srgb_to_linear[v as usize]
    }

    #[inline]
    pub fn linear_to_srgb_u8(&self, l: f32) -> u8 {
        let idx = (l.clamp(0.0, 1.0) * 4095.0).round() as usize;
        self.linear_to_srgb[idx]
    }

    /// `alpha` of `src` over `dst`, mixed in linear light.
    pub fn mix(&self, src: u8, dst: u8, alpha: f32) -> u8 {
        let l = alpha * self.srgb_u8_to_linear(src) + (1.0 - alpha) * self.srgb_u8_to_linear(dst);
        self.linear_to_srgb_u8(l)
    }

    /// Whole 0x00RRGGBB pixels, channel by channel.
    pub fn mix_rgb(&self, src: u32, dst: u32, alpha: f32) -> u32 {
        [16u32, 8, 0].iter().fold(0, |acc, &shift| {
            acc | u32::from(self.mix((src >> shift) as u8, (dst >> shift) as u8, alpha)) << shift
        })
    }
}

impl Default for GammaLut {
    fn default() -> Self {
        Self::new()
    }
}
