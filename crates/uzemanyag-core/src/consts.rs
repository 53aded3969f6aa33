// Copyright (c) 2025 SOLARE S.R.O.
//
// This file is part of Magyar Üzemanyagárak.
//
// Licensed under the Creative Commons Attribution-NonCommercial-NoDerivatives 4.0 International
// (CC BY-NC-ND 4.0). You may use and share this file for non-commercial purposes only and you may not
// create derivatives. See <https://creativecommons.org/licenses/by-nc-nd/4.0/>.
//
// This software is provided "AS IS", without warranty of any kind.
//
// For commercial licensing, please contact: info@solare.cz

use std::time::Duration;

/// Integration domain, also used as the singleton config entry id
pub const DOMAIN: &str = "magyar_uzemanyag";

/// Public fuel price endpoint (OMV Hungary statistics)
pub const API_ENDPOINT: &str = "https://api.omw.hu/fuel_price_hu.php";

pub const DEFAULT_NAME: &str = "Magyar Üzemanyagárak";

/// 1 hour between refreshes
pub const UPDATE_INTERVAL: Duration = Duration::from_secs(3600);

/// Budget for one whole request (connect + body)
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Value of `errorCode` the API sends on success
pub const SUCCESS_ERROR_CODE: i64 = 200;
