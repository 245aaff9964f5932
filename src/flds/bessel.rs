//! Bessel functions of the first kind and their zeros.
use crate::consts::PI;
use crate::Float;

const RESCALE: Float = 1E250;

/// J_n(x) for integer order, by Miller's backward recurrence normalized
/// with J_0 + 2 sum J_2k = 1.
pub fn jn(n: i32, x: Float) -> Float {
    if n < 0 {
        let v = jn(-n, x);
        return if n % 2 == 0 { v } else { -v };
    }
    if x < 0.0 {
        let v = jn(n, -x);
        return if n % 2 == 0 { v } else { -v };
    }
    let n = n as usize;
    if x == 0.0 {
        return if n == 0 { 1.0 } else { 0.0 };
    }

    let big = n.max(x as usize);
    let start = 2 * ((big + 15 + ((40 * (big + 1)) as Float).sqrt() as usize) / 2);

    let mut j_next = 0.0;
    let mut j = 1E-30;
    let mut result = 0.0;
    let mut norm = 0.0;
    for k in (1..=start).rev() {
        // j holds J_k, compute J_{k-1}
        let j_prev = 2.0 * k as Float / x * j - j_next;
        j_next = j;
        j = j_prev;
        if k - 1 == n {
            result = j;
        }
        if (k - 1) % 2 == 0 && k > 1 {
            norm += 2.0 * j;
        }
        if j.abs() > RESCALE {
            j /= RESCALE;
            j_next /= RESCALE;
            norm /= RESCALE;
            result /= RESCALE;
        }
    }
    norm += j;
    result / norm
}

/// dJ_m/dx
pub fn jn_prime(m: i32, x: Float) -> Float {
    0.5 * (jn(m - 1, x) - jn(m + 1, x))
}

/// The first `count` positive zeros of J_m: McMahon's expansion as the
/// initial guess, polished with Newton.
pub fn jn_zeros(m: usize, count: usize) -> Vec<Float> {
    let mu = 4.0 * (m * m) as Float;
    (1..=count)
        .map(|k| {
            let beta = (k as Float + 0.5 * m as Float - 0.25) * PI;
            let eight_beta = 8.0 * beta;
            let mut x = beta
                - (mu - 1.0) / eight_beta
                - 4.0 * (mu - 1.0) * (7.0 * mu - 31.0) / (3.0 * eight_beta.powi(3));
            for _ in 0..50 {
                let dx = jn(m as i32, x) / jn_prime(m as i32, x);
                x -= dx;
                if dx.abs() < 1E-15 * x {
                    break;
                }
            }
            x
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn known_values() {
        assert_abs_diff_eq!(jn(0, 1.0), 0.765_197_686_557_966_6, epsilon = 1E-14);
        assert_abs_diff_eq!(jn(1, 1.0), 0.440_050_585_744_933_5, epsilon = 1E-14);
        assert_abs_diff_eq!(jn(2, 5.0), 0.046_565_116_277_752_21, epsilon = 1E-14);
        assert_abs_diff_eq!(jn(-1, 1.0), -jn(1, 1.0), epsilon = 1E-16);
        assert_abs_diff_eq!(jn(3, 0.0), 0.0);
    }

    #[test]
    fn recurrence_holds() {
        for &x in &[0.3, 2.7, 11.0, 48.5] {
            for n in 1..6 {
                let lhs = jn(n - 1, x) + jn(n + 1, x);
                let rhs = 2.0 * n as Float / x * jn(n, x);
                assert_abs_diff_eq!(lhs, rhs, epsilon = 1E-12);
            }
        }
    }

    #[test]
    fn zeros() {
        let z0 = jn_zeros(0, 3);
        assert_abs_diff_eq!(z0[0], 2.404_825_557_695_773, epsilon = 1E-12);
        assert_abs_diff_eq!(z0[2], 8.653_727_912_911_013, epsilon = 1E-12);
        let z1 = jn_zeros(1, 2);
        assert_abs_diff_eq!(z1[0], 3.831_705_970_207_512, epsilon = 1E-12);
        for (m, zeros) in [(2, jn_zeros(2, 20)), (5, jn_zeros(5, 20))] {
            for w in zeros.windows(2) {
                assert!(w[1] > w[0]);
            }
            for z in zeros {
                assert!(jn(m, z).abs() < 1E-12);
            }
        }
    }
}
