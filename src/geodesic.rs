// Earth's radius in meters.
pub const EARTH_RADIUS_METERS: f64 = 6_371_000.0;

/// Great-circle distance in meters between two latitude/longitude pairs (degrees), using the
/// haversine formula. NaN inputs propagate to a NaN result.
pub fn distance(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64
//-----------------------------------------------------------------
{
   let lat1_rad = lat1.to_radians();
   let lat2_rad = lat2.to_radians();

   let d_lat = lat2_rad - lat1_rad;
   let d_lon = (lon2 - lon1).to_radians();

   let mut a = (d_lat / 2.0).sin().powi(2) + lat1_rad.cos() * lat2_rad.cos() * (d_lon / 2.0).sin().powi(2);
   // Rounding can push a fraction above 1 for antipodal points; a NaN must survive this.
   if a > 1.0
   {
      a = 1.0;
   }
   let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

   EARTH_RADIUS_METERS * c
}
