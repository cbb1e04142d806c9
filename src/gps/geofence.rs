//! Circular geofences and enter/exit tracking.

use serde::{Deserialize, Serialize};

use super::geo::haversine_distance;

/// A circle around a centre point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Geofence {
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
    /// Radius in metres.
    pub radius: f64,
}

impl Geofence {
    pub fn new(name: impl Into<String>, latitude: f64, longitude: f64, radius: f64) -> Self {
        Self {
            name: name.into(),
            latitude,
            longitude,
            radius,
        }
    }

    /// Fence centred on `centre` whose edge passes through `boundary`.
    pub fn from_boundary(name: impl Into<String>, centre: (f64, f64), boundary: (f64, f64)) -> Self {
        let radius = haversine_distance(centre.0, centre.1, boundary.0, boundary.1);
        Self::new(name, centre.0, centre.1, radius)
    }

    /// Distance from the centre in metres.
    pub fn distance_to(&self, lat: f64, lon: f64) -> f64 {
        haversine_distance(self.latitude, self.longitude, lat, lon)
    }

    /// Inside when the distance is at most the radius.
    pub fn contains(&self, lat: f64, lon: f64) -> bool {
        self.distance_to(lat, lon) <= self.radius
    }
}

/// First fence (in list order) that contains the point.
pub fn find_containing<'a>(fences: &'a [Geofence], lat: f64, lon: f64) -> Option<&'a Geofence> {
    if !lat.is_finite() || !lon.is_finite() {
        return None;
    }
    fences.iter().find(|f| f.contains(lat, lon))
}

/// A transition reported by [`GeofenceMonitor`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GeofenceEvent {
    Entered(String),
    Exited(String),
}

/// Remembers which fence the receiver is in so each crossing is reported once.
#[derive(Debug, Default)]
pub struct GeofenceMonitor {
    inside: Option<String>,
}

impl GeofenceMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Name of the fence currently occupied.
    pub fn current(&self) -> Option<&str> {
        self.inside.as_deref()
    }

    /// Check a position; positions without coordinates are ignored.
    pub fn check(&mut self, fences: &[Geofence], lat: f64, lon: f64) -> Vec<GeofenceEvent> {
        if !lat.is_finite() || !lon.is_finite() {
            return Vec::new();
        }

        let now_inside = find_containing(fences, lat, lon).map(|f| f.name.clone());
        if now_inside == self.inside {
            return Vec::new();
        }

        let mut events = Vec::new();
        if let Some(previous) = self.inside.take() {
            events.push(GeofenceEvent::Exited(previous));
        }
        if let Some(name) = &now_inside {
            events.push(GeofenceEvent::Entered(name.clone()));
        }
        self.inside = now_inside;
        events
    }

    pub fn reset(&mut self) {
        self.inside = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fences() -> Vec<Geofence> {
        vec![
            Geofence::new("home", 40.0, -105.0, 100.0),
            Geofence::new("work", 40.01, -105.0, 200.0),
        ]
    }

    #[test]
    fn test_radius_from_boundary() {
        let fence = Geofence::from_boundary("park", (0.0, 0.0), (0.001, 0.0));
        assert!((fence.radius - 111.19).abs() < 0.1);
        assert!(fence.contains(0.0005, 0.0));
        assert!(!fence.contains(0.002, 0.0));
    }

    #[test]
    fn test_boundary_point_is_inside() {
        let fence = Geofence::from_boundary("edge", (10.0, 10.0), (10.0, 10.01));
        assert!(fence.contains(10.0, 10.01));
    }

    #[test]
    fn test_first_match_wins() {
        let overlapping = vec![
            Geofence::new("big", 40.0, -105.0, 5_000.0),
            Geofence::new("small", 40.0, -105.0, 10.0),
        ];
        assert_eq!(find_containing(&overlapping, 40.0, -105.0).unwrap().name, "big");
        assert!(find_containing(&overlapping, f64::NAN, -105.0).is_none());
    }

    #[test]
    fn test_monitor_reports_transitions_once() {
        let fences = fences();
        let mut monitor = GeofenceMonitor::new();

        assert_eq!(
            monitor.check(&fences, 40.0, -105.0),
            vec![GeofenceEvent::Entered("home".to_string())]
        );
        assert!(monitor.check(&fences, 40.0001, -105.0).is_empty());
        assert!(monitor.check(&fences, f64::NAN, f64::NAN).is_empty());
        assert_eq!(monitor.current(), Some("home"));

        assert_eq!(
            monitor.check(&fences, 40.01, -105.0),
            vec![
                GeofenceEvent::Exited("home".to_string()),
                GeofenceEvent::Entered("work".to_string())
            ]
        );
        assert_eq!(
            monitor.check(&fences, 41.0, -105.0),
            vec![GeofenceEvent::Exited("work".to_string())]
        );
        assert_eq!(monitor.current(), None);
    }
}
