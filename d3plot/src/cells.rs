//! This module defines the cell types a d3plot database can hold and the
//! concrete cell shapes they are assembled into.

use std::fmt::Display;
use core::str::FromStr;

use serde::{Serialize, Deserialize};
use clap::ValueEnum;

/// Generates the CellType enum.
macro_rules! gen_cell_types {
  (
    $(($vn:ident, $nm:literal, $conn:literal, $nodes:literal),)*
  ) => {
    /// Known cell types, in the order their parts are enumerated.
    #[derive(
      Copy, Clone, Debug, Serialize, Deserialize, PartialEq, Eq, PartialOrd,
      Ord, Hash, ValueEnum
    )]
    #[clap(rename_all = "kebab-case")]
    #[allow(missing_docs)]
    pub enum CellType {
      $($vn,)*
    }

    impl CellType {
      /// Returns the name of the cell type.
      pub const fn name(&self) -> &'static str {
        return match self {
          $(Self::$vn => $nm,)*
        };
      }

      /// Returns the number of words in a connectivity record on disk,
      /// including the trailing material id when there is one.
      pub const fn connectivity_words(&self) -> usize {
        return match self {
          $(Self::$vn => $conn,)*
        };
      }

      /// Returns the number of point ids in a connectivity record.
      pub const fn nodes_per_cell(&self) -> usize {
        return match self {
          $(Self::$vn => $nodes,)*
        };
      }

      /// Returns a static slice with all known cell types.
      pub const fn all() -> &'static [Self] {
        return &[
          $(Self::$vn,)*
        ];
      }
    }

    impl FromStr for CellType {
      type Err = ();

      fn from_str(s: &str) -> Result<Self, Self::Err> {
        return match s {
          $(
            $nm => Ok(Self::$vn),
          )*
          _ => return Err(())
        };
      }
    }
  };
}

gen_cell_types!(
  (Particle, "Particle", 2, 1),
  (Beam, "Beam", 6, 2),
  (Shell, "Shell", 5, 4),
  (ThickShell, "ThickShell", 9, 8),
  (Solid, "Solid", 9, 8),
  (RigidBody, "RigidBody", 5, 4),
  (RoadSurface, "RoadSurface", 4, 4),
);

impl CellType {
  /// Returns the cell type for a raw type code (its position in `all()`).
  pub fn from_code(code: i64) -> Option<Self> {
    return usize::try_from(code).ok()
      .and_then(|i| Self::all().get(i))
      .copied();
  }

  /// Returns the raw type code of this cell type.
  pub fn code(&self) -> i64 {
    return Self::all().iter()
      .position(|c| c == self)
      .map_or(-1, |i| i as i64);
  }

  /// Whether the static section numbers cells of this type. Rigid bodies
  /// share the shell table.
  pub fn has_user_ids(&self) -> bool {
    return !matches!(self, Self::Particle | Self::RoadSurface);
  }
}

impl Display for CellType {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    return write!(f, "{}", self.name());
  }
}

/// Concrete shapes cells are assembled into.
#[derive(
  Copy, Clone, Debug, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord,
  Hash
)]
pub enum CellKind {
  /// A single point.
  Vertex,
  /// A two-point line.
  Line,
  /// A four-point quadrilateral.
  Quad,
  /// An eight-point quadratic quadrilateral.
  QuadraticQuad,
  /// A four-point tetrahedron.
  Tetra,
  /// A five-point pyramid.
  Pyramid,
  /// A six-point wedge.
  Wedge,
  /// An eight-point hexahedron.
  Hexahedron
}

impl CellKind {
  /// Number of points that make up a cell of this kind.
  pub const fn point_count(&self) -> usize {
    return match self {
      Self::Vertex => 1,
      Self::Line => 2,
      Self::Quad => 4,
      Self::QuadraticQuad => 8,
      Self::Tetra => 4,
      Self::Pyramid => 5,
      Self::Wedge => 6,
      Self::Hexahedron => 8
    };
  }

  /// Classifies a solid. Solids are always written as degenerate hexahedra:
  /// repeats of the last point id in the top face tell the real shape.
  pub fn classify_solid(conn: &[i64]) -> Self {
    if conn.len() < 8 {
      return Self::Hexahedron;
    }
    if conn[3] == conn[7] {
      return Self::Tetra;
    }
    if conn[4] == conn[7] {
      return Self::Pyramid;
    }
    if conn[5] == conn[7] {
      return Self::Wedge;
    }
    return Self::Hexahedron;
  }

  /// The kind every cell of a non-solid type is assembled as.
  pub const fn for_type(cell_type: CellType) -> Self {
    return match cell_type {
      CellType::Particle => Self::Vertex,
      CellType::Beam => Self::Line,
      CellType::Shell | CellType::RigidBody | CellType::RoadSurface => Self::Quad,
      CellType::ThickShell => Self::QuadraticQuad,
      CellType::Solid => Self::Hexahedron
    };
  }
}
