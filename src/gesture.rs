//! Gesture codes and classification of touch sequences.

use num_enum::{FromPrimitive, IntoPrimitive};

/// Marker returned when the sequence holds no touch.
pub const NO_TOUCH: u8 = 0xFF;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, IntoPrimitive, FromPrimitive)]
#[repr(u8)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Gesture {
    #[default]
    Unknown = 0,
    Tap = 1,
    DoubleTap = 2,
    SwipeUp = 3,
    SwipeDown = 4,
    SwipeLeft = 5,
    SwipeRight = 6,
    Proximity = 7,
}

/// Physical placement of the electrodes on the switch plate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ElectrodeMap {
    pub top: u8,
    pub left: u8,
    pub bottom: u8,
    pub right: u8,
    pub center: u8,
    pub proximity: u8,
}

impl Default for ElectrodeMap {
    fn default() -> Self {
        Self {
            top: 0,
            left: 1,
            bottom: 2,
            right: 3,
            center: 4,
            proximity: 12,
        }
    }
}

impl ElectrodeMap {
    pub const SIZE: usize = 6;

    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        [
            self.top,
            self.left,
            self.bottom,
            self.right,
            self.center,
            self.proximity,
        ]
    }

    pub fn from_bytes(bytes: &[u8; Self::SIZE]) -> Self {
        let [top, left, bottom, right, center, proximity] = *bytes;
        Self {
            top,
            left,
            bottom,
            right,
            center,
            proximity,
        }
    }

    /// Swipe direction when moving from the center towards `edge`.
    fn towards(&self, edge: u8) -> Option<Gesture> {
        if edge == self.bottom {
            Some(Gesture::SwipeDown)
        } else if edge == self.top {
            Some(Gesture::SwipeUp)
        } else if edge == self.right {
            Some(Gesture::SwipeRight)
        } else if edge == self.left {
            Some(Gesture::SwipeLeft)
        } else {
            None
        }
    }
}

/// Classifies an ordered touch sequence. The first rule that matches wins:
/// short swipe out of the center, long swipe across the plate, tap or
/// double tap, proximity.
pub fn classify(seq: &[u8], map: &ElectrodeMap, proximity_event: bool) -> Gesture {
    short_swipe(seq, map)
        .or_else(|| long_swipe(seq, map))
        .or_else(|| tap(seq))
        .unwrap_or(if seq.is_empty() && proximity_event {
            Gesture::Proximity
        } else {
            Gesture::Unknown
        })
}

fn short_swipe(seq: &[u8], map: &ElectrodeMap) -> Option<Gesture> {
    match *seq {
        [first, second] if first == map.center => map.towards(second),
        _ => None,
    }
}

fn long_swipe(seq: &[u8], map: &ElectrodeMap) -> Option<Gesture> {
    let (&first, &last) = (seq.first()?, seq.last()?);
    if seq.len() < 2 {
        return None;
    }
    match (first, last) {
        (f, l) if f == map.top && l == map.bottom => Some(Gesture::SwipeDown),
        (f, l) if f == map.bottom && l == map.top => Some(Gesture::SwipeUp),
        (f, l) if f == map.left && l == map.right => Some(Gesture::SwipeRight),
        (f, l) if f == map.right && l == map.left => Some(Gesture::SwipeLeft),
        _ => None,
    }
}

fn tap(seq: &[u8]) -> Option<Gesture> {
    match *seq {
        [_] => Some(Gesture::Tap),
        [a, b] if a == b => Some(Gesture::DoubleTap),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gesture(seq: &[u8]) -> Gesture {
        classify(seq, &ElectrodeMap::default(), false)
    }

    #[test]
    fn test_long_swipes() {
        let m = ElectrodeMap::default();
        assert_eq!(gesture(&[m.top, m.bottom]), Gesture::SwipeDown);
        assert_eq!(gesture(&[m.bottom, m.center, m.top]), Gesture::SwipeUp);
        assert_eq!(gesture(&[m.left, m.center, m.right]), Gesture::SwipeRight);
        assert_eq!(gesture(&[m.right, m.top, m.center, m.left]), Gesture::SwipeLeft);
    }

    #[test]
    fn test_short_swipes_from_center() {
        let m = ElectrodeMap::default();
        assert_eq!(gesture(&[m.center, m.bottom]), Gesture::SwipeDown);
        assert_eq!(gesture(&[m.center, m.top]), Gesture::SwipeUp);
        assert_eq!(gesture(&[m.center, m.right]), Gesture::SwipeRight);
        assert_eq!(gesture(&[m.center, m.left]), Gesture::SwipeLeft);
        // not an edge
        assert_eq!(gesture(&[m.center, 7]), Gesture::Unknown);
    }

    #[test]
    fn test_taps() {
        let m = ElectrodeMap::default();
        assert_eq!(gesture(&[m.top]), Gesture::Tap);
        assert_eq!(gesture(&[m.left, m.left]), Gesture::DoubleTap);
        assert_eq!(gesture(&[m.left, m.top]), Gesture::Unknown);
        assert_eq!(gesture(&[m.left, m.left, m.left]), Gesture::Unknown);
    }

    #[test]
    fn test_center_double_tap_is_not_a_swipe() {
        let m = ElectrodeMap::default();
        assert_eq!(gesture(&[m.center, m.center]), Gesture::DoubleTap);
    }

    #[test]
    fn test_proximity_only_when_empty() {
        let m = ElectrodeMap::default();
        assert_eq!(classify(&[], &m, true), Gesture::Proximity);
        assert_eq!(classify(&[], &m, false), Gesture::Unknown);
        assert_eq!(classify(&[m.top], &m, true), Gesture::Tap);
    }

    #[test]
    fn test_remapped_electrodes() {
        let m = ElectrodeMap {
            top: 5,
            bottom: 6,
            ..ElectrodeMap::default()
        };
        assert_eq!(classify(&[5, 6], &m, false), Gesture::SwipeDown);
        assert_eq!(classify(&[0, 2], &m, false), Gesture::Unknown);
    }

    #[test]
    fn test_gesture_codes() {
        assert_eq!(u8::from(Gesture::Proximity), 7);
        assert_eq!(Gesture::from(3), Gesture::SwipeUp);
        assert_eq!(Gesture::from(200), Gesture::Unknown);
    }
}
