//! Radix-2 complex FFT used by the synthesis stage.

use std::f32::consts;
use std::ops::{Add, AddAssign, Mul, Sub};

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Complex32 {
    pub re: f32,
    pub im: f32,
}

pub const COMPLEX_ZERO: Complex32 = Complex32 { re: 0.0, im: 0.0 };

impl Complex32 {
    pub const fn new(re: f32, im: f32) -> Self {
        Self { re, im }
    }

    pub fn from_polar(magnitude: f32, (cos, sin): (f32, f32)) -> Self {
        Self {
            re: magnitude * cos,
            im: magnitude * sin,
        }
    }

    pub fn conj(self) -> Self {
        Self {
            re: self.re,
            im: -self.im,
        }
    }

    pub fn scale(self, k: f32) -> Self {
        Self {
            re: self.re * k,
            im: self.im * k,
        }
    }
}

impl Add for Complex32 {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self::new(self.re + rhs.re, self.im + rhs.im)
    }
}

impl AddAssign for Complex32 {
    fn add_assign(&mut self, rhs: Self) {
        self.re += rhs.re;
        self.im += rhs.im;
    }
}

impl Sub for Complex32 {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        Self::new(self.re - rhs.re, self.im - rhs.im)
    }
}

impl Mul for Complex32 {
    type Output = Self;

    fn mul(self, rhs: Self) -> Self {
        Self::new(
            self.re * rhs.re - self.im * rhs.im,
            self.re * rhs.im + self.im * rhs.re,
        )
    }
}

/// Precomputed twiddles and bit-reversal permutation for one transform size.
#[derive(Debug, Clone)]
pub struct Fft {
    order: u32,
    twiddles: Vec<Complex32>,
    swaps: Vec<(usize, usize)>,
}

impl Fft {
    /// Transform of `2^order` points. `order` must be at least 1.
    pub fn new(order: u32) -> Self {
        let size = 1usize << order;

        // Inverse-direction twiddles e^{+2πik/N}, k < N/2.
        let twiddles = (0..size / 2)
            .map(|k| {
                let theta = consts::TAU * k as f32 / size as f32;
                Complex32::new(theta.cos(), theta.sin())
            })
            .collect();

        let swaps = (0..size)
            .filter_map(|i| {
                let j = i.reverse_bits() >> (usize::BITS - order);
                (i < j).then_some((i, j))
            })
            .collect();

        Self {
            order,
            twiddles,
            swaps,
        }
    }

    pub fn size(&self) -> usize {
        1 << self.order
    }

    pub fn order(&self) -> u32 {
        self.order
    }

    /// Unnormalized inverse transform: `x[n] = Σ X[k]·e^{+2πikn/N}`.
    pub fn do_ifft_inplace(&self, data: &mut [Complex32]) {
        let size = self.size();
        debug_assert_eq!(data.len(), size);

        for &(i, j) in &self.swaps {
            data.swap(i, j);
        }

        let mut half = 1;
        while half < size {
            let stride = size / (half * 2);
            for block in data.chunks_exact_mut(half * 2) {
                let (lo, hi) = block.split_at_mut(half);
                for (k, (a, b)) in lo.iter_mut().zip(hi.iter_mut()).enumerate() {
                    let t = *b * self.twiddles[k * stride];
                    *b = *a - t;
                    *a = *a + t;
                }
            }
            half *= 2;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn naive_ifft(input: &[Complex32]) -> Vec<Complex32> {
        let n = input.len();
        (0..n)
            .map(|t| {
                input.iter().enumerate().fold(COMPLEX_ZERO, |acc, (k, x)| {
                    let theta = consts::TAU * (k * t % n) as f32 / n as f32;
                    acc + *x * Complex32::new(theta.cos(), theta.sin())
                })
            })
            .collect()
    }

    #[test]
    fn matches_direct_evaluation() {
        for order in 1..=6 {
            let fft = Fft::new(order);
            let input = (0..fft.size())
                .map(|i| Complex32::new((i as f32 * 0.7).sin(), (i as f32 * 1.3).cos()))
                .collect::<Vec<_>>();

            let expected = naive_ifft(&input);
            let mut data = input.clone();
            fft.do_ifft_inplace(&mut data);

            for (a, b) in data.iter().zip(&expected) {
                assert!((a.re - b.re).abs() < 1e-3, "order {order}: {a:?} vs {b:?}");
                assert!((a.im - b.im).abs() < 1e-3, "order {order}: {a:?} vs {b:?}");
            }
        }
    }

    #[test]
    fn conjugate_pair_gives_real_cosine() {
        let fft = Fft::new(5);
        let n = fft.size();
        let k = 3;
        let mut data = vec![COMPLEX_ZERO; n];
        data[k] = Complex32::new(0.5, 0.0);
        data[n - k] = data[k].conj();
        fft.do_ifft_inplace(&mut data);

        for (t, x) in data.iter().enumerate() {
            let expected = (consts::TAU * (k * t) as f32 / n as f32).cos();
            assert!((x.re - expected).abs() < 1e-5);
            assert!(x.im.abs() < 1e-5);
        }
    }

    #[test]
    fn zero_in_zero_out() {
        let fft = Fft::new(8);
        let mut data = vec![COMPLEX_ZERO; fft.size()];
        fft.do_ifft_inplace(&mut data);
        assert!(data.iter().all(|x| *x == COMPLEX_ZERO));
    }
}
