use {
    crate::events::{CrisisEvent, RiskLevel, SocialSignalEvent, Urgency, WeatherRiskEvent},
    chrono::{DateTime, Utc},
    serde::Serialize,
    std::collections::{BTreeMap, VecDeque},
};

/// Bounded, arrival-ordered store of the two event streams
///
/// Each stream keeps at most `capacity` events. Once full, every append
/// drops the oldest arrival. Event timestamps play no part in ordering:
/// late or duplicate events simply take the next slot.
#[derive(Debug, Clone)]
pub struct EventCache {
    weather: VecDeque<WeatherRiskEvent>,
    social: VecDeque<SocialSignalEvent>,
    capacity: usize,
}

/// Most recent events per stream, oldest first
#[derive(Debug, Clone, Serialize)]
pub struct LatestEvents {
    pub weather: Vec<WeatherRiskEvent>,
    pub social: Vec<SocialSignalEvent>,
    pub last_updated: DateTime<Utc>,
}

impl LatestEvents {
    /// Both streams as one list, weather first, each in arrival order
    pub fn combined(&self) -> Vec<CrisisEvent> {
        self.weather
            .iter()
            .cloned()
            .map(CrisisEvent::Weather)
            .chain(self.social.iter().cloned().map(CrisisEvent::Social))
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ClearSummary {
    pub weather_kept: usize,
    pub social_kept: usize,
}

/// Counts over the cached events
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CacheStats {
    pub weather_total: usize,
    pub weather_by_risk: BTreeMap<RiskLevel, usize>,
    pub social_total: usize,
    pub social_by_urgency: BTreeMap<Urgency, usize>,
    pub social_by_category: BTreeMap<String, usize>,
}

impl CacheStats {
    pub fn critical_social_reports(&self) -> usize {
        self.social_by_urgency
            .get(&Urgency::Critical)
            .copied()
            .unwrap_or(0)
    }
}

impl EventCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            weather: VecDeque::with_capacity(capacity),
            social: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Insert into the matching stream, evicting the oldest arrival when full
    pub fn append(&mut self, event: CrisisEvent) {
        match event {
            CrisisEvent::Weather(e) => push_bounded(&mut self.weather, e, self.capacity),
            CrisisEvent::Social(e) => push_bounded(&mut self.social, e, self.capacity),
        }
    }

    /// The newest `limit` events of each stream, most recent last
    pub fn latest(&self, limit: usize, now: DateTime<Utc>) -> LatestEvents {
        LatestEvents {
            weather: tail(&self.weather, limit),
            social: tail(&self.social, limit),
            last_updated: now,
        }
    }

    /// Keep only the newest `floor(len * keep_fraction)` events of each stream
    pub fn truncate_to_fraction(&mut self, keep_fraction: f64) -> ClearSummary {
        let fraction = if keep_fraction.is_nan() {
            0.0
        } else {
            keep_fraction.clamp(0.0, 1.0)
        };

        let weather_kept = (self.weather.len() as f64 * fraction).floor() as usize;
        let social_kept = (self.social.len() as f64 * fraction).floor() as usize;

        keep_newest(&mut self.weather, weather_kept);
        keep_newest(&mut self.social, social_kept);

        ClearSummary {
            weather_kept,
            social_kept,
        }
    }

    pub fn weather(&self) -> &VecDeque<WeatherRiskEvent> {
        &self.weather
    }

    pub fn social(&self) -> &VecDeque<SocialSignalEvent> {
        &self.social
    }

    pub fn len(&self) -> usize {
        self.weather.len() + self.social.len()
    }

    pub fn is_empty(&self) -> bool {
        self.weather.is_empty() && self.social.is_empty()
    }

    /// Replace both streams with restored contents, keeping the newest entries
    pub fn restore(&mut self, weather: Vec<WeatherRiskEvent>, social: Vec<SocialSignalEvent>) {
        self.weather = weather.into();
        self.social = social.into();
        keep_newest(&mut self.weather, self.capacity);
        keep_newest(&mut self.social, self.capacity);
    }

    pub fn stats(&self) -> CacheStats {
        let mut stats = CacheStats {
            weather_total: self.weather.len(),
            social_total: self.social.len(),
            ..CacheStats::default()
        };

        for event in &self.weather {
            *stats.weather_by_risk.entry(event.risk_level).or_default() += 1;
        }

        for event in &self.social {
            *stats.social_by_urgency.entry(event.data.urgency).or_default() += 1;
            *stats
                .social_by_category
                .entry(event.data.category.clone())
                .or_default() += 1;
        }

        stats
    }
}

fn push_bounded<T>(buffer: &mut VecDeque<T>, item: T, capacity: usize) {
    buffer.push_back(item);
    while buffer.len() > capacity {
        buffer.pop_front();
    }
}

fn keep_newest<T>(buffer: &mut VecDeque<T>, keep: usize) {
    let excess = buffer.len().saturating_sub(keep);
    buffer.drain(..excess);
}

fn tail<T: Clone>(buffer: &VecDeque<T>, limit: usize) -> Vec<T> {
    let skip = buffer.len().saturating_sub(limit);
    buffer.iter().skip(skip).cloned().collect()
}
