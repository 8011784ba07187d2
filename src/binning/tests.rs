// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Map binner tests.

use approx::assert_abs_diff_eq;

use super::*;
use crate::{
    comm::SerialComm,
    cov::CovAndHits,
    pixels::{PixelCov, PixelDist},
    pointing::{GridPointing, StokesMode},
    tests::{fake_dataset, fake_noise, fill_random},
};

/// Binning a constant intensity signal must reproduce that constant in
/// every hit pixel: the weighted mean of a constant is the constant.
#[test]
fn test_bin_constant_signal() {
    let mut data = fake_dataset(1000);
    data.obs[0].detdata_mut("signal").unwrap().fill(3.25);
    let pointing = GridPointing::new(64, StokesMode::I);
    let noise = fake_noise();
    let dist = PixelDist::full(64, StokesMode::I);
    let comm = SerialComm;

    CovAndHits::new(&pointing, &noise, &dist, &comm)
        .apply(&mut data)
        .unwrap();
    BinMap::new(&pointing, &noise, &dist, &comm, "covariance")
        .apply(&mut data, "signal")
        .unwrap();

    let map = data.map("binned").unwrap();
    for row in map.data.outer_iter() {
        assert_abs_diff_eq!(row[0], 3.25, epsilon = 1e-12);
    }
}

/// Binning through a cached covariance and through a freshly rebuilt one
/// must agree bit for bit.
#[test]
fn test_bin_determinism_cached_vs_rebuilt() {
    let mut data = fake_dataset(1000);
    fill_random(&mut data, "signal", 123_456);
    let pointing = GridPointing::new(64, StokesMode::Iqu);
    let noise = fake_noise();
    let dist = PixelDist::full(64, StokesMode::Iqu);
    let comm = SerialComm;

    CovAndHits::new(&pointing, &noise, &dist, &comm)
        .apply(&mut data)
        .unwrap();
    BinMap::new(&pointing, &noise, &dist, &comm, "covariance")
        .apply(&mut data, "signal")
        .unwrap();

    // Rebuild the covariance from scratch under different names and bin
    // again.
    let mut builder = CovAndHits::new(&pointing, &noise, &dist, &comm);
    builder.hits = "hits_fresh".to_string();
    builder.covariance = "covariance_fresh".to_string();
    builder.apply(&mut data).unwrap();
    let mut binner = BinMap::new(&pointing, &noise, &dist, &comm, "covariance_fresh");
    binner.binned = "binned_fresh".to_string();
    binner.apply(&mut data, "signal").unwrap();

    let first = data.map("binned").unwrap();
    let second = data.map("binned_fresh").unwrap();
    assert_eq!(first.data, second.data);
}

/// Flipping a single sample's flag changes only the pixel that sample
/// contributed to, by exactly its weighted contribution.
#[test]
fn test_flag_exclusion_is_local() {
    let n_pix = 64;
    let flag_det = 2;
    let flag_samp = 517;
    let flagged_pixel = (flag_det * 17 + flag_samp) % n_pix;

    let mut data = fake_dataset(1000);
    fill_random(&mut data, "signal", 98_765);
    let pointing = GridPointing::new(n_pix, StokesMode::I);
    let noise = fake_noise();
    let dist = PixelDist::full(n_pix, StokesMode::I);
    let comm = SerialComm;

    CovAndHits::new(&pointing, &noise, &dist, &comm)
        .apply(&mut data)
        .unwrap();
    BinMap::new(&pointing, &noise, &dist, &comm, "covariance")
        .apply(&mut data, "signal")
        .unwrap();
    let before = data.map("binned").unwrap().data.clone();

    data.obs[0].flags[(flag_det, flag_samp)] = 1;
    let mut builder = CovAndHits::new(&pointing, &noise, &dist, &comm);
    builder.hits = "hits2".to_string();
    builder.covariance = "covariance2".to_string();
    builder.apply(&mut data).unwrap();
    let mut binner = BinMap::new(&pointing, &noise, &dist, &comm, "covariance2");
    binner.binned = "binned2".to_string();
    binner.apply(&mut data, "signal").unwrap();
    let after = data.map("binned2").unwrap().data.clone();

    // Expected new value at the flagged pixel: the weighted mean over the
    // remaining samples. Uniform weights cancel to a plain mean.
    let obs = &data.obs[0];
    let signal = obs.detdata("signal").unwrap();
    let mut sum = 0.0;
    let mut count = 0;
    for i_det in 0..4 {
        for i_samp in 0..1000 {
            if (i_det * 17 + i_samp) % n_pix != flagged_pixel {
                continue;
            }
            if i_det == flag_det && i_samp == flag_samp {
                continue;
            }
            sum += signal[(i_det, i_samp)];
            count += 1;
        }
    }

    for p in 0..n_pix {
        if p == flagged_pixel {
            assert_abs_diff_eq!(after[(p, 0)], sum / count as f64, epsilon = 1e-9);
            assert!((after[(p, 0)] - before[(p, 0)]).abs() > 0.0);
        } else {
            assert_eq!(after[(p, 0)], before[(p, 0)]);
        }
    }
}

/// Scanning a map into a timestream adds (or subtracts) the map value at
/// each sample's pixel.
#[test]
fn test_scan_map_roundtrip() {
    let mut data = fake_dataset(200);
    let pointing = GridPointing::new(64, StokesMode::I);
    let dist = PixelDist::full(64, StokesMode::I);

    let mut map = crate::pixels::SkyMap::zeros(&dist);
    for (p, mut row) in map.data.outer_iter_mut().enumerate() {
        row[0] = p as f64;
    }

    scan_map(&pointing, &dist, &map, &mut data.obs, "signal", false).unwrap();
    {
        let signal = data.obs[0].detdata("signal").unwrap();
        for i_det in 0..4 {
            for i_samp in 0..200 {
                let expected = ((i_det * 17 + i_samp) % 64) as f64;
                assert_abs_diff_eq!(signal[(i_det, i_samp)], expected);
            }
        }
    }

    // Subtracting the same map restores the zeros.
    scan_map(&pointing, &dist, &map, &mut data.obs, "signal", true).unwrap();
    let signal = data.obs[0].detdata("signal").unwrap();
    assert!(signal.iter().all(|&v| v == 0.0));
}

#[test]
fn test_binning_requires_inverted_covariance() {
    let mut data = fake_dataset(100);
    let pointing = GridPointing::new(64, StokesMode::I);
    let noise = fake_noise();
    let dist = PixelDist::full(64, StokesMode::I);
    let comm = SerialComm;

    data.covs
        .insert("raw".to_string(), PixelCov::zeros(&dist));
    let result = BinMap::new(&pointing, &noise, &dist, &comm, "raw").apply(&mut data, "signal");
    assert!(matches!(result, Err(BinError::NotInverted { .. })));
}
