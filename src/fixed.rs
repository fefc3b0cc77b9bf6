//! 16.16 fixed-point math, kept for determinism parity with the legacy
//! integer engine. Only the LOS tracer and the fixed-precision point
//! location query use these; everything else works in f64.

/// 16.16 fixed-point number.
pub type Fixed = i32;

pub const FRACBITS: u32 = 16;
pub const FRACUNIT: Fixed = 1 << FRACBITS;

#[inline]
pub fn to_fixed(v: f64) -> Fixed {
    (v * FRACUNIT as f64) as Fixed
}

#[inline]
pub fn to_f64(v: Fixed) -> f64 {
    v as f64 / FRACUNIT as f64
}

#[inline]
pub fn fixed_mul(a: Fixed, b: Fixed) -> Fixed {
    ((a as i64 * b as i64) >> FRACBITS) as Fixed
}

#[inline]
pub fn fixed_div(a: Fixed, b: Fixed) -> Fixed {
    // Saturate on overflow, as the original FixedDiv did.
    if (a.abs() >> 14) >= b.abs() {
        if (a ^ b) < 0 { Fixed::MIN } else { Fixed::MAX }
    } else {
        (((a as i64) << FRACBITS) / b as i64) as Fixed
    }
}

/// Which side of the directed line `(origin, direction)` is `point` on?
/// 0 = front, 1 = back. Mirrors the original divline side test, including
/// the axis-aligned fast paths and the sign-bit shortcut.
pub fn point_on_line_side(point: [Fixed; 2], origin: [Fixed; 2], direction: [Fixed; 2]) -> i32 {
    let [x, y] = point;
    let [ox, oy] = origin;
    let [dx, dy] = direction;

    if dx == 0 {
        return if x <= ox {
            (dy > 0) as i32
        } else {
            (dy < 0) as i32
        };
    }
    if dy == 0 {
        return if y <= oy {
            (dx < 0) as i32
        } else {
            (dx > 0) as i32
        };
    }

    let px = x.wrapping_sub(ox);
    let py = y.wrapping_sub(oy);

    // Quick answer when the sign bits alone decide it.
    if ((py ^ px ^ dx ^ dy) as u32) & 0x8000_0000 != 0 {
        return (((py ^ dx) as u32 & 0x8000_0000) != 0) as i32;
    }

    let left = fixed_mul(dy >> 8, px >> 8);
    let right = fixed_mul(py >> 8, dx >> 8);
    (right >= left) as i32
}

/// Fraction along the trace `(t_origin, t_dir)` at which it intersects the
/// line `(l_origin, l_dir)`. The `>> 8` intermediate shifts match the
/// original intercept computation (they trade precision for range).
pub fn intercept_fraction(
    t_origin: [Fixed; 2],
    t_dir: [Fixed; 2],
    l_origin: [Fixed; 2],
    l_dir: [Fixed; 2],
) -> Fixed {
    let den = fixed_mul(l_dir[1] >> 8, t_dir[0]) - fixed_mul(l_dir[0] >> 8, t_dir[1]);
    if den == 0 {
        return 0;
    }
    let num = fixed_mul((l_origin[0] - t_origin[0]) >> 8, l_dir[1])
        + fixed_mul((t_origin[1] - l_origin[1]) >> 8, l_dir[0]);
    fixed_div(num, den)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip() {
        assert_eq!(to_fixed(1.0), FRACUNIT);
        assert!((to_f64(to_fixed(123.625)) - 123.625).abs() < 1.0 / 65536.0);
    }

    #[test]
    fn mul_div_inverse() {
        let a = to_fixed(48.5);
        let b = to_fixed(3.0);
        let q = fixed_div(a, b);
        assert!((to_f64(q) - 48.5 / 3.0).abs() < 1e-3);
        assert!((to_f64(fixed_mul(q, b)) - 48.5).abs() < 1e-3);
    }

    #[test]
    fn div_saturates() {
        assert_eq!(fixed_div(Fixed::MAX, 1), Fixed::MAX);
        assert_eq!(fixed_div(Fixed::MAX, -1), Fixed::MIN);
    }

    #[test]
    fn side_of_east_line() {
        let origin = [0, 0];
        let dir = [to_fixed(64.0), 0];
        // South of an east-pointing line is the front side.
        assert_eq!(point_on_line_side([to_fixed(8.0), to_fixed(-8.0)], origin, dir), 0);
        assert_eq!(point_on_line_side([to_fixed(8.0), to_fixed(8.0)], origin, dir), 1);
    }

    #[test]
    fn side_of_diagonal_line() {
        let origin = [0, 0];
        let dir = [to_fixed(64.0), to_fixed(64.0)];
        assert_eq!(point_on_line_side([to_fixed(32.0), to_fixed(0.0)], origin, dir), 0);
        assert_eq!(point_on_line_side([to_fixed(0.0), to_fixed(32.0)], origin, dir), 1);
    }

    #[test]
    fn intercept_halfway() {
        // Trace west→east through a vertical line at x=32: hits halfway.
        let frac = intercept_fraction(
            [to_fixed(0.0), to_fixed(0.0)],
            [to_fixed(64.0), 0],
            [to_fixed(32.0), to_fixed(-64.0)],
            [0, to_fixed(128.0)],
        );
        assert!((to_f64(frac) - 0.5).abs() < 1e-2);
    }
}
