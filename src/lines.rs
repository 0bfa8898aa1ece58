//! Static line registry.
//!
//! Maps the short line identifiers used in URLs to the GTFS route id of the
//! real-time feed and the internal id used by the coordinate and timetable
//! files. The table is closed: adding a line means adding an entry here and
//! dropping its timetable file into the data directory.

/// Per-line configuration.
#[derive(Debug, Clone, Copy)]
pub struct LineConfig {
    /// Short identifier used in URLs and timetable file names (e.g. `yamanote`).
    pub line_id: &'static str,
    /// Japanese display name.
    pub name_ja: &'static str,
    /// Latin display name.
    pub name_en: &'static str,
    /// Route id carried by the GTFS-RT feed.
    pub gtfs_route_id: &'static str,
    /// Key into `railways.json` / `coordinates.json` and the station id prefix.
    pub internal_id: &'static str,
    /// Canonical direction names as `(odd-numbered trips, even-numbered trips)`.
    pub directions: (&'static str, &'static str),
    /// Optional prefix prepended to bare feed stop ids.
    pub stop_id_prefix: Option<&'static str>,
    /// Loop lines wrap polyline indices instead of reversing.
    pub is_loop: bool,
}

impl LineConfig {
    /// Direction name for trips travelling in ascending station order.
    pub fn ascending_direction(&self) -> &'static str {
        self.directions.0
    }
}

/// All supported lines.
///
/// Direction pairs follow the operator's numbering convention: odd train
/// numbers run in the first-listed direction, even numbers in the second.
pub const SUPPORTED_LINES: &[LineConfig] = &[
    LineConfig {
        line_id: "yamanote",
        name_ja: "山手線",
        name_en: "Yamanote Line",
        gtfs_route_id: "JR-East.Yamanote",
        internal_id: "JR-East.Yamanote",
        directions: ("OuterLoop", "InnerLoop"),
        stop_id_prefix: None,
        is_loop: true,
    },
    LineConfig {
        line_id: "chuo_rapid",
        name_ja: "中央線快速",
        name_en: "Chuo Rapid Line",
        gtfs_route_id: "JR-East.ChuoRapid",
        internal_id: "JR-East.ChuoRapid",
        directions: ("Outbound", "Inbound"),
        stop_id_prefix: None,
        is_loop: false,
    },
    LineConfig {
        line_id: "keihin_tohoku",
        name_ja: "京浜東北線・根岸線",
        name_en: "Keihin-Tohoku Negishi Line",
        gtfs_route_id: "JR-East.KeihinTohokuNegishi",
        internal_id: "JR-East.KeihinTohokuNegishi",
        directions: ("Southbound", "Northbound"),
        stop_id_prefix: None,
        is_loop: false,
    },
    LineConfig {
        line_id: "sobu_local",
        name_ja: "中央・総武線各駅停車",
        name_en: "Chuo-Sobu Local Line",
        gtfs_route_id: "JR-East.ChuoSobuLocal",
        internal_id: "JR-East.ChuoSobuLocal",
        directions: ("Westbound", "Eastbound"),
        stop_id_prefix: None,
        is_loop: false,
    },
    LineConfig {
        line_id: "yokohama",
        name_ja: "横浜線",
        name_en: "Yokohama Line",
        gtfs_route_id: "JR-East.Yokohama",
        internal_id: "JR-East.Yokohama",
        directions: ("Outbound", "Inbound"),
        stop_id_prefix: None,
        is_loop: false,
    },
    LineConfig {
        line_id: "saikyo",
        name_ja: "埼京線・川越線",
        name_en: "Saikyo-Kawagoe Line",
        gtfs_route_id: "JR-East.SaikyoKawagoe",
        internal_id: "JR-East.SaikyoKawagoe",
        directions: ("Northbound", "Southbound"),
        stop_id_prefix: None,
        is_loop: false,
    },
    LineConfig {
        line_id: "nambu",
        name_ja: "南武線",
        name_en: "Nambu Line",
        gtfs_route_id: "JR-East.Nambu",
        internal_id: "JR-East.Nambu",
        directions: ("Outbound", "Inbound"),
        stop_id_prefix: None,
        is_loop: false,
    },
    LineConfig {
        line_id: "joban",
        name_ja: "常磐線",
        name_en: "Joban Line",
        gtfs_route_id: "JR-East.Joban",
        internal_id: "JR-East.Joban",
        directions: ("Outbound", "Inbound"),
        stop_id_prefix: None,
        is_loop: false,
    },
    LineConfig {
        line_id: "joban_rapid",
        name_ja: "常磐線快速",
        name_en: "Joban Rapid Line",
        gtfs_route_id: "JR-East.JobanRapid",
        internal_id: "JR-East.JobanRapid",
        directions: ("Outbound", "Inbound"),
        stop_id_prefix: None,
        is_loop: false,
    },
    LineConfig {
        line_id: "joban_local",
        name_ja: "常磐線各駅停車",
        name_en: "Joban Local Line",
        gtfs_route_id: "JR-East.JobanLocal",
        internal_id: "JR-East.JobanLocal",
        directions: ("Outbound", "Inbound"),
        stop_id_prefix: None,
        is_loop: false,
    },
    LineConfig {
        line_id: "keiyo",
        name_ja: "京葉線",
        name_en: "Keiyo Line",
        gtfs_route_id: "JR-East.Keiyo",
        internal_id: "JR-East.Keiyo",
        directions: ("Outbound", "Inbound"),
        stop_id_prefix: None,
        is_loop: false,
    },
    LineConfig {
        line_id: "musashino",
        name_ja: "武蔵野線",
        name_en: "Musashino Line",
        gtfs_route_id: "JR-East.Musashino",
        internal_id: "JR-East.Musashino",
        directions: ("Outbound", "Inbound"),
        stop_id_prefix: None,
        is_loop: false,
    },
    LineConfig {
        line_id: "sobu_rapid",
        name_ja: "総武快速線",
        name_en: "Sobu Rapid Line",
        gtfs_route_id: "JR-East.SobuRapid",
        internal_id: "JR-East.SobuRapid",
        directions: ("Outbound", "Inbound"),
        stop_id_prefix: None,
        is_loop: false,
    },
    LineConfig {
        line_id: "tokaido",
        name_ja: "東海道線",
        name_en: "Tokaido Line",
        gtfs_route_id: "JR-East.Tokaido",
        internal_id: "JR-East.Tokaido",
        directions: ("Outbound", "Inbound"),
        stop_id_prefix: None,
        is_loop: false,
    },
    LineConfig {
        line_id: "yokosuka",
        name_ja: "横須賀線",
        name_en: "Yokosuka Line",
        gtfs_route_id: "JR-East.Yokosuka",
        internal_id: "JR-East.Yokosuka",
        directions: ("Southbound", "Northbound"),
        stop_id_prefix: None,
        is_loop: false,
    },
    LineConfig {
        line_id: "takasaki",
        name_ja: "高崎線",
        name_en: "Takasaki Line",
        gtfs_route_id: "JR-East.Takasaki",
        internal_id: "JR-East.Takasaki",
        directions: ("Outbound", "Inbound"),
        stop_id_prefix: None,
        is_loop: false,
    },
    LineConfig {
        line_id: "utsunomiya",
        name_ja: "宇都宮線",
        name_en: "Utsunomiya Line",
        gtfs_route_id: "JR-East.Utsunomiya",
        internal_id: "JR-East.Utsunomiya",
        directions: ("Outbound", "Inbound"),
        stop_id_prefix: None,
        is_loop: false,
    },
    LineConfig {
        line_id: "shonan_shinjuku",
        name_ja: "湘南新宿ライン",
        name_en: "Shonan-Shinjuku Line",
        gtfs_route_id: "JR-East.ShonanShinjuku",
        internal_id: "JR-East.ShonanShinjuku",
        directions: ("Southbound", "Northbound"),
        stop_id_prefix: None,
        is_loop: false,
    },
];

/// Look up a line by its short identifier.
pub fn get(line_id: &str) -> Option<&'static LineConfig> {
    SUPPORTED_LINES.iter().find(|l| l.line_id == line_id)
}

/// Look up a line by short identifier or internal identifier.
pub fn find(id: &str) -> Option<&'static LineConfig> {
    get(id).or_else(|| SUPPORTED_LINES.iter().find(|l| l.internal_id == id))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_and_internal_ids_resolve() {
        assert!(get("yamanote").is_some());
        assert!(get("JR-East.Yamanote").is_none());
        assert_eq!(
            find("JR-East.Yamanote").unwrap().line_id,
            find("yamanote").unwrap().line_id
        );
    }

    #[test]
    fn unknown_line_is_none() {
        assert!(get("tozai").is_none());
        assert!(find("Metro.Tozai").is_none());
    }

    #[test]
    fn only_the_loop_line_is_flagged() {
        let loops: Vec<_> = SUPPORTED_LINES.iter().filter(|l| l.is_loop).collect();
        assert_eq!(loops.len(), 1);
        assert_eq!(loops[0].line_id, "yamanote");
    }

    #[test]
    fn ids_are_unique() {
        let mut seen = std::collections::HashSet::new();
        for line in SUPPORTED_LINES {
            assert!(seen.insert(line.line_id), "duplicate line_id {}", line.line_id);
        }
    }
}
