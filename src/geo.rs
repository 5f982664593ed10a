//! Great-circle distance and grid snapping

/// Mean Earth radius in kilometres
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Haversine distance between two (lat, lon) points in kilometres
pub fn haversine_km(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let lat1_rad = lat1.to_radians();
    let lat2_rad = lat2.to_radians();
    let delta_lat = (lat2 - lat1).to_radians();
    let delta_lon = (lon2 - lon1).to_radians();

    let a = (delta_lat / 2.0).sin().powi(2)
        + lat1_rad.cos() * lat2_rad.cos() * (delta_lon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

    EARTH_RADIUS_KM * c
}

/// Index of the grid cell of size `cell_deg` whose center is nearest `value`
pub fn grid_index(value: f64, cell_deg: f64) -> i64 {
    (value / cell_deg).round_ties_even() as i64
}

/// Center coordinate of grid cell `index`
pub fn grid_center(index: i64, cell_deg: f64) -> f64 {
    index as f64 * cell_deg
}

/// Round to `decimals` places for presentation
pub fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}
