// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use approx::assert_abs_diff_eq;
use indexmap::IndexMap;

use super::*;
use crate::tests::{fake_dataset, TEST_DETS};

#[test]
fn test_diagonal_noise_lookup() {
    let mut weights = IndexMap::new();
    weights.insert("det00".to_string(), 1.5);
    weights.insert("det01".to_string(), 0.5);
    let noise = DiagonalNoise::new(weights);
    assert_abs_diff_eq!(noise.detector_weight("det01").unwrap(), 0.5);
    assert!(matches!(
        noise.detector_weight("det99"),
        Err(NoiseError::UnknownDetector { .. })
    ));
}

#[test]
fn test_noise_weight_in_place() {
    let mut data = fake_dataset(100);
    data.obs[0].detdata_mut("signal").unwrap().fill(2.0);

    let noise = DiagonalNoise::uniform(TEST_DETS, 2.5);
    let nw = NoiseWeight { noise: &noise };
    nw.apply(&mut data, "signal").unwrap();

    let arr = data.obs[0].detdata("signal").unwrap();
    assert!(arr.iter().all(|&v| (v - 5.0).abs() < 1e-15));

    // Weighting twice compounds; nothing is cached.
    nw.apply(&mut data, "signal").unwrap();
    let arr = data.obs[0].detdata("signal").unwrap();
    assert!(arr.iter().all(|&v| (v - 12.5).abs() < 1e-15));
}

#[test]
fn test_noise_weight_missing_buffer() {
    let mut data = fake_dataset(10);
    let noise = DiagonalNoise::uniform(TEST_DETS, 1.0);
    let nw = NoiseWeight { noise: &noise };
    assert!(nw.apply(&mut data, "nonexistent").is_err());
}
