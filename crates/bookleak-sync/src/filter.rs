//! Game selection by recency and time class.

use bookleak_core::{Game, TimeClass};
use chrono::{DateTime, Duration, Utc};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum FilterError {
    #[error("--include and --exclude cannot be combined")]
    IncludeAndExclude,
}

/// Keep games that ended within the last `days` days of `now`. Zero keeps all.
pub fn within_days(games: Vec<Game>, days: u32, now: DateTime<Utc>) -> Vec<Game> {
    if days == 0 {
        return games;
    }
    let cutoff = now - Duration::days(i64::from(days));
    games.into_iter().filter(|g| g.played_at >= cutoff).collect()
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum TimeClassFilter {
    #[default]
    All,
    Include(Vec<TimeClass>),
    Exclude(Vec<TimeClass>),
}

impl TimeClassFilter {
    pub fn new(include: Vec<TimeClass>, exclude: Vec<TimeClass>) -> Result<Self, FilterError> {
        match (include.is_empty(), exclude.is_empty()) {
            (true, true) => Ok(Self::All),
            (false, true) => Ok(Self::Include(include)),
            (true, false) => Ok(Self::Exclude(exclude)),
            (false, false) => Err(FilterError::IncludeAndExclude),
        }
    }

    /// A game without a known time class never matches an include list.
    pub fn matches(&self, game: &Game) -> bool {
        match self {
            Self::All => true,
            Self::Include(classes) => game.time_class.is_some_and(|t| classes.contains(&t)),
            Self::Exclude(classes) => !game.time_class.is_some_and(|t| classes.contains(&t)),
        }
    }

    pub fn apply(&self, games: Vec<Game>) -> Vec<Game> {
        games.into_iter().filter(|g| self.matches(g)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bookleak_core::{Color, Outcome};
    use chrono::TimeZone;

    fn game(id: &str, day: u32, time_class: Option<TimeClass>) -> Game {
        Game {
            id: id.into(),
            moves: Vec::new(),
            color: Color::Black,
            time_class,
            time_control: String::new(),
            outcome: Outcome::Win,
            played_at: Utc.with_ymd_and_hms(2024, 5, day, 0, 0, 0).unwrap(),
            source: "test".into(),
            eco: None,
            opening: None,
        }
    }

    #[test]
    fn recent_window() {
        let now = Utc.with_ymd_and_hms(2024, 5, 31, 0, 0, 0).unwrap();
        let games = vec![game("old", 1, None), game("new", 25, None)];

        let kept = within_days(games.clone(), 7, now);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].id, "new");
        assert_eq!(within_days(games, 0, now).len(), 2);
    }

    #[test]
    fn include_and_exclude() {
        let games = vec![
            game("b", 1, Some(TimeClass::Blitz)),
            game("r", 1, Some(TimeClass::Rapid)),
            game("u", 1, None),
        ];
        let ids = |f: &TimeClassFilter| -> Vec<String> {
            f.apply(games.clone()).into_iter().map(|g| g.id).collect()
        };

        let include = TimeClassFilter::new(vec![TimeClass::Blitz], vec![]).unwrap();
        assert_eq!(ids(&include), vec!["b"]);

        let exclude = TimeClassFilter::new(vec![], vec![TimeClass::Blitz]).unwrap();
        assert_eq!(ids(&exclude), vec!["r", "u"]);

        assert_eq!(ids(&TimeClassFilter::default()).len(), 3);
        assert_eq!(
            TimeClassFilter::new(vec![TimeClass::Rapid], vec![TimeClass::Blitz]),
            Err(FilterError::IncludeAndExclude)
        );
    }
}
