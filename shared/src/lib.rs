use std::fmt;
use std::str::FromStr;
use thiserror::Error;

pub const GRID_ROWS: usize = 5;
pub const GRID_COLS: usize = 5;
pub const MAX_PLAYERS: usize = 4;
pub const STARTING_HP: i32 = 100;
pub const ATTACK_DAMAGE: i32 = 10;
pub const WALLS: [(usize, usize); 2] = [(2, 2), (1, 3)];

pub const WALL_SYMBOL: char = '#';
pub const OPEN_SYMBOL: char = '.';

pub const STATE_HEADER: &str = "STATE";
pub const PLAYERS_HEADER: &str = "PLAYERS";
pub const SERVER_FULL: &str = "Server full";

/// Longest command line accepted, in bytes, not counting the line ending.
pub const MAX_COMMAND_LEN: usize = 1024;

// Slot i spawns at (i, 0) and is drawn as 'A' + i.
const _: () = assert!(MAX_PLAYERS <= GRID_ROWS);
const _: () = assert!(MAX_PLAYERS <= 26);

/// Marker symbol painted on the grid for the given slot.
pub fn marker(slot: usize) -> char {
    (b'A' + slot as u8) as char
}

/// Removes any trailing CR/LF left over from the transport.
pub fn strip_line_ending(line: &str) -> &str {
    line.trim_end_matches(['\r', '\n'])
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
}

impl Direction {
    /// (row, col) delta for a single step.
    pub fn offset(self) -> (isize, isize) {
        match self {
            Direction::Up => (-1, 0),
            Direction::Down => (1, 0),
            Direction::Left => (0, -1),
            Direction::Right => (0, 1),
        }
    }
}

impl FromStr for Direction {
    type Err = MalformedCommand;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "UP" => Ok(Direction::Up),
            "DOWN" => Ok(Direction::Down),
            "LEFT" => Ok(Direction::Left),
            "RIGHT" => Ok(Direction::Right),
            other => Err(MalformedCommand::UnknownDirection(other.to_string())),
        }
    }
}

/// A single line of client input, as understood by the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Move(Direction),
    Attack,
    Quit,
    Chat(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MalformedCommand {
    #[error("unknown direction {0:?}")]
    UnknownDirection(String),
    #[error("unrecognized command {0:?}")]
    Unrecognized(String),
    #[error("command of {0} bytes exceeds the {max} byte limit", max = MAX_COMMAND_LEN)]
    TooLong(usize),
}

impl FromStr for Command {
    type Err = MalformedCommand;

    /// Keywords are case-sensitive literal prefixes, so `ATTACKNOW` is an attack.
    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let line = strip_line_ending(line);
        if line.len() > MAX_COMMAND_LEN {
            return Err(MalformedCommand::TooLong(line.len()));
        }

        if let Some(rest) = line.strip_prefix("MOVE") {
            rest.trim().parse().map(Command::Move)
        } else if line.starts_with("ATTACK") {
            Ok(Command::Attack)
        } else if line.starts_with("QUIT") {
            Ok(Command::Quit)
        } else if let Some(rest) = line.strip_prefix("CHAT") {
            Ok(Command::Chat(rest.trim().to_string()))
        } else {
            Err(MalformedCommand::Unrecognized(line.to_string()))
        }
    }
}

/// One entry of the `PLAYERS` block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerLine {
    pub marker: char,
    pub row: usize,
    pub col: usize,
    pub hp: i32,
}

impl fmt::Display for PlayerLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: ({},{}) HP: {}", self.marker, self.row, self.col, self.hp)
    }
}

impl FromStr for PlayerLine {
    type Err = MalformedFrame;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let bad = || MalformedFrame::PlayerLine(line.to_string());

        let (marker, rest) = line.split_once(": (").ok_or_else(bad)?;
        let mut chars = marker.chars();
        let marker = match (chars.next(), chars.next()) {
            (Some(c), None) => c,
            _ => return Err(bad()),
        };
        let (coords, hp) = rest.split_once(") HP: ").ok_or_else(bad)?;
        let (row, col) = coords.split_once(',').ok_or_else(bad)?;

        Ok(PlayerLine {
            marker,
            row: row.parse().map_err(|_| bad())?,
            col: col.parse().map_err(|_| bad())?,
            hp: hp.parse().map_err(|_| bad())?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MalformedFrame {
    #[error("expected {0:?} header")]
    MissingHeader(&'static str),
    #[error("grid row {0:?} has the wrong width")]
    BadRow(String),
    #[error("unparseable player line {0:?}")]
    PlayerLine(String),
}

/// Full game state as broadcast after every processed event.
///
/// Rendered form:
///
/// ```text
/// STATE
/// A....
/// ...#.
/// ..#..
/// .....
/// .....
/// PLAYERS
/// A: (0,0) HP: 100
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateSnapshot {
    pub rows: Vec<String>,
    pub players: Vec<PlayerLine>,
}

impl StateSnapshot {
    /// Looks up a player entry by marker.
    pub fn player(&self, marker: char) -> Option<&PlayerLine> {
        self.players.iter().find(|p| p.marker == marker)
    }

    /// Symbol at (row, col), if in bounds.
    pub fn cell(&self, row: usize, col: usize) -> Option<char> {
        self.rows.get(row).and_then(|r| r.chars().nth(col))
    }

    /// Parses a complete frame. The `PLAYERS` block runs to the end of `text`.
    pub fn parse(text: &str) -> Result<Self, MalformedFrame> {
        let mut lines = text.lines().map(strip_line_ending);

        if lines.next() != Some(STATE_HEADER) {
            return Err(MalformedFrame::MissingHeader(STATE_HEADER));
        }

        let mut rows = Vec::with_capacity(GRID_ROWS);
        for _ in 0..GRID_ROWS {
            let row = lines
                .next()
                .ok_or(MalformedFrame::MissingHeader(PLAYERS_HEADER))?;
            if row.chars().count() != GRID_COLS {
                return Err(MalformedFrame::BadRow(row.to_string()));
            }
            rows.push(row.to_string());
        }

        if lines.next() != Some(PLAYERS_HEADER) {
            return Err(MalformedFrame::MissingHeader(PLAYERS_HEADER));
        }

        let players = lines
            .filter(|l| !l.is_empty())
            .map(str::parse)
            .collect::<Result<Vec<PlayerLine>, _>>()?;

        Ok(StateSnapshot { rows, players })
    }
}

impl fmt::Display for StateSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", STATE_HEADER)?;
        for row in &self.rows {
            writeln!(f, "{}", row)?;
        }
        writeln!(f, "{}", PLAYERS_HEADER)?;
        for player in &self.players {
            writeln!(f, "{}", player)?;
        }
        Ok(())
    }
}
