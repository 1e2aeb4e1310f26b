//! Geofence evaluator
//!
//! Given one position fix and the zone collection, decides which armed zones
//! have just been entered. The evaluator is pure: it does no I/O, keeps no
//! state between calls and never talks to the alert sink. Callers persist
//! the returned zones and deliver the returned events.

use chrono::{DateTime, Local};
use geoalarm_api::{Coordinate, TriggerEvent, TriggerPolicy, Zone};
use geoalarm_util::{GeoalarmError, Result, ZoneId};
use std::borrow::Cow;

use crate::geo::haversine_distance;

/// Outcome of one evaluation pass
#[derive(Debug)]
pub struct Evaluation<'a> {
    /// Zones in input order. Untouched zones borrow from the input.
    pub zones: Vec<Cow<'a, Zone>>,

    /// One event per zone that flipped to triggered in this pass
    pub events: Vec<TriggerEvent>,

    /// Distance from the position for every zone that was measured
    pub distances: Vec<(ZoneId, f64)>,

    /// Zones skipped because their geometry is malformed
    pub rejected: Vec<(ZoneId, GeoalarmError)>,
}

impl<'a> Evaluation<'a> {
    /// Whether any zone differs from the input
    pub fn changed(&self) -> bool {
        self.zones.iter().any(|z| matches!(z, Cow::Owned(_)))
    }

    /// Distance to `zone_id`, if it was measured in this pass
    pub fn distance_to(&self, zone_id: &ZoneId) -> Option<f64> {
        self.distances
            .iter()
            .find(|(id, _)| id == zone_id)
            .map(|(_, d)| *d)
    }

    pub fn into_zones(self) -> Vec<Zone> {
        self.zones.into_iter().map(Cow::into_owned).collect()
    }
}

/// Evaluate `position` against every zone.
///
/// Fails only when the position itself is malformed. Each zone is skipped
/// when inactive, already triggered, or snoozed past `now`; otherwise it is
/// triggered when the haversine distance is within its radius (boundary
/// inclusive).
pub fn evaluate<'a>(
    position: Coordinate,
    zones: &'a [Zone],
    now: DateTime<Local>,
    policy: TriggerPolicy,
) -> Result<Evaluation<'a>> {
    position.validate()?;

    let mut evaluation = Evaluation {
        zones: Vec::with_capacity(zones.len()),
        events: Vec::new(),
        distances: Vec::new(),
        rejected: Vec::new(),
    };

    for zone in zones {
        if !zone.is_armed(now) {
            evaluation.zones.push(Cow::Borrowed(zone));
            continue;
        }

        if let Err(e) = zone.validate() {
            evaluation.rejected.push((zone.id.clone(), e));
            evaluation.zones.push(Cow::Borrowed(zone));
            continue;
        }

        let distance = haversine_distance(position, zone.center);
        evaluation.distances.push((zone.id.clone(), distance));

        if distance <= zone.radius_meters {
            let mut updated = zone.clone();
            updated.mark_triggered(policy);
            evaluation.events.push(TriggerEvent {
                zone_id: zone.id.clone(),
                name: zone.name.clone(),
            });
            evaluation.zones.push(Cow::Owned(updated));
        } else {
            evaluation.zones.push(Cow::Borrowed(zone));
        }
    }

    Ok(evaluation)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo::destination;
    use chrono::Duration;

    fn center() -> Coordinate {
        Coordinate::new(28.6139, 77.2090)
    }

    fn zone(id: &str, radius: f64) -> Zone {
        Zone {
            id: ZoneId::new(id),
            name: format!("Zone {}", id),
            center: center(),
            radius_meters: radius,
            active: true,
            triggered: false,
            snoozed_until: None,
        }
    }

    fn run(position: Coordinate, zones: &[Zone]) -> Evaluation<'_> {
        evaluate(position, zones, Local::now(), TriggerPolicy::KeepActive).unwrap()
    }

    #[test]
    fn enters_zone_456m_north() {
        let zones = vec![zone("a", 500.0)];
        let eval = run(Coordinate::new(28.6180, 77.2090), &zones);

        assert_eq!(
            eval.events,
            vec![TriggerEvent {
                zone_id: ZoneId::new("a"),
                name: "Zone a".into(),
            }]
        );
        assert!(eval.zones[0].triggered);
        assert!(eval.zones[0].active);
        assert!(eval.changed());
    }

    #[test]
    fn far_position_changes_nothing() {
        let zones = vec![zone("a", 500.0)];
        let eval = run(destination(center(), 90.0, 3000.0), &zones);

        assert!(eval.events.is_empty());
        assert!(!eval.changed());
        assert_eq!(eval.into_zones(), zones);
    }

    #[test]
    fn already_triggered_zone_stays_put() {
        let mut z = zone("a", 500.0);
        z.triggered = true;
        let zones = vec![z];

        let eval = run(center(), &zones);

        assert!(eval.events.is_empty());
        assert!(eval.zones[0].triggered);
        assert!(!eval.changed());
    }

    #[test]
    fn inside_and_outside_500m_zone() {
        let zones = vec![zone("a", 500.0)];

        let inside = run(destination(center(), 0.0, 400.0), &zones);
        assert_eq!(inside.events.len(), 1);

        let outside = run(destination(center(), 0.0, 600.0), &zones);
        assert!(outside.events.is_empty());
    }

    #[test]
    fn boundary_is_inclusive() {
        let zones = vec![zone("a", 500.0)];
        let eval = run(center(), &zones);
        let d = eval.distance_to(&ZoneId::new("a")).unwrap();
        assert_eq!(d, 0.0);

        // A zone whose radius equals the measured distance triggers
        let p = destination(center(), 45.0, 250.0);
        let exact = haversine_distance(p, center());
        let zones = vec![zone("b", exact)];
        assert_eq!(run(p, &zones).events.len(), 1);
    }

    #[test]
    fn evaluation_is_idempotent() {
        let zones = vec![zone("a", 500.0), zone("b", 50.0)];
        let p = destination(center(), 180.0, 200.0);

        let first = run(p, &zones).into_zones();
        let second = run(p, &first);

        assert!(second.events.is_empty());
        assert!(!second.changed());
        assert_eq!(second.into_zones(), first);
    }

    #[test]
    fn trigger_is_monotonic() {
        let zones = vec![zone("a", 500.0)];
        let after_entry = run(center(), &zones).into_zones();

        // Leaving the zone never clears the flag
        let after_exit = run(destination(center(), 0.0, 5000.0), &after_entry).into_zones();
        assert!(after_exit[0].triggered);
    }

    #[test]
    fn inactive_zone_is_never_evaluated() {
        let mut z = zone("a", 500.0);
        z.active = false;
        let zones = vec![z];

        let eval = run(center(), &zones);
        assert!(eval.events.is_empty());
        assert!(eval.distances.is_empty());
        assert!(!eval.zones[0].triggered);
    }

    #[test]
    fn snooze_suppresses_until_deadline() {
        let now = Local::now();
        let mut z = zone("a", 500.0);
        z.snoozed_until = Some(now + Duration::minutes(5));
        let zones = vec![z];

        let during = evaluate(center(), &zones, now, TriggerPolicy::KeepActive).unwrap();
        assert!(during.events.is_empty());
        assert!(!during.changed());

        let after = evaluate(
            center(),
            &zones,
            now + Duration::minutes(6),
            TriggerPolicy::KeepActive,
        )
        .unwrap();
        assert_eq!(after.events.len(), 1);
    }

    #[test]
    fn events_match_flipped_zones() {
        let zones = vec![
            zone("a", 500.0),
            zone("b", 10.0),
            {
                let mut z = zone("c", 500.0);
                z.triggered = true;
                z
            },
            zone("d", 1000.0),
        ];
        let eval = run(destination(center(), 90.0, 300.0), &zones);

        let flipped: Vec<ZoneId> = zones
            .iter()
            .zip(eval.zones.iter())
            .filter(|(before, after)| !before.triggered && after.triggered)
            .map(|(before, _)| before.id.clone())
            .collect();
        let evented: Vec<ZoneId> = eval.events.iter().map(|e| e.zone_id.clone()).collect();

        assert_eq!(flipped, evented);
        assert_eq!(evented, vec![ZoneId::new("a"), ZoneId::new("d")]);
    }

    #[test]
    fn deactivate_policy_switches_zone_off() {
        let zones = vec![zone("a", 500.0)];
        let eval = evaluate(center(), &zones, Local::now(), TriggerPolicy::Deactivate).unwrap();

        assert_eq!(eval.events.len(), 1);
        assert!(eval.zones[0].triggered);
        assert!(!eval.zones[0].active);
    }

    #[test]
    fn malformed_zone_is_skipped_others_evaluated() {
        let zones = vec![zone("bad", -1.0), zone("good", 500.0)];
        let eval = run(center(), &zones);

        assert_eq!(eval.rejected.len(), 1);
        assert_eq!(eval.rejected[0].0, ZoneId::new("bad"));
        assert!(matches!(eval.rejected[0].1, GeoalarmError::InvalidInput(_)));
        assert!(!eval.zones[0].triggered);
        assert_eq!(eval.events.len(), 1);
        assert_eq!(eval.events[0].zone_id, ZoneId::new("good"));
    }

    #[test]
    fn malformed_position_is_an_error() {
        let zones = vec![zone("a", 500.0)];
        for bad in [
            Coordinate::new(f64::NAN, 77.0),
            Coordinate::new(91.0, 77.0),
            Coordinate::new(28.0, -181.0),
        ] {
            let result = evaluate(bad, &zones, Local::now(), TriggerPolicy::KeepActive);
            assert!(matches!(result, Err(GeoalarmError::InvalidInput(_))));
        }
    }

    #[test]
    fn unchanged_zones_are_borrowed() {
        let zones = vec![zone("a", 500.0), zone("b", 500.0)];
        let far = destination(center(), 0.0, 10_000.0);
        let eval = run(far, &zones);

        for (out, input) in eval.zones.iter().zip(zones.iter()) {
            match out {
                Cow::Borrowed(z) => assert!(std::ptr::eq(*z, input)),
                Cow::Owned(_) => panic!("unchanged zone was copied"),
            }
        }
    }

    #[test]
    fn empty_collection() {
        let eval = run(center(), &[]);
        assert!(eval.zones.is_empty());
        assert!(eval.events.is_empty());
    }
}
