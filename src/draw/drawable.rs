//! Drawable handles submitted to the canvas.

use super::color::Color;
use serde::{Deserialize, Serialize};

/// 2D point in canvas coordinates.
pub type Point = (f64, f64);

/// Translation, rotation (degrees, about the origin) and uniform scale.
///
/// Applied to a shape's vertices in the order scale, rotate, translate.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Transform {
    pub translate: Point,
    pub rotation_deg: f64,
    pub scale: f64,
}

impl Default for Transform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Transform {
    pub const IDENTITY: Transform = Transform {
        translate: (0.0, 0.0),
        rotation_deg: 0.0,
        scale: 1.0,
    };

    pub fn translated(dx: f64, dy: f64) -> Self {
        Self {
            translate: (dx, dy),
            ..Self::IDENTITY
        }
    }

    pub fn with_rotation(self, degrees: f64) -> Self {
        Self {
            rotation_deg: degrees,
            ..self
        }
    }

    pub fn with_scale(self, scale: f64) -> Self {
        Self { scale, ..self }
    }

    pub fn apply(&self, (x, y): Point) -> Point {
        let (x, y) = (x * self.scale, y * self.scale);
        let (sin, cos) = self.rotation_deg.to_radians().sin_cos();
        let (x, y) = (x * cos - y * sin, x * sin + y * cos);
        (x + self.translate.0, y + self.translate.1)
    }
}

/// Axis-aligned bounds of a drawable's transformed vertices.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Bounds {
    pub min: Point,
    pub max: Point,
}

impl Bounds {
    fn from_points(points: &[Point]) -> Option<Self> {
        let (&first, rest) = points.split_first()?;
        let mut bounds = Bounds {
            min: first,
            max: first,
        };
        for &(x, y) in rest {
            bounds.min.0 = bounds.min.0.min(x);
            bounds.min.1 = bounds.min.1.min(y);
            bounds.max.0 = bounds.max.0.max(x);
            bounds.max.1 = bounds.max.1.max(y);
        }
        Some(bounds)
    }

    pub fn width(&self) -> f64 {
        self.max.0 - self.min.0
    }

    pub fn height(&self) -> f64 {
        self.max.1 - self.min.1
    }
}

/// Closed set of renderable primitives.
///
/// Geometry is deliberately simple: each variant only needs to expose its
/// vertices so a backend can rasterize it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Shape {
    /// Open line strip through `points`.
    Polyline { points: Vec<Point>, thickness: f64 },
    Triangle { vertices: [Point; 3] },
    Rectangle {
        x: f64,
        y: f64,
        width: f64,
        height: f64,
        filled: bool,
    },
    /// Circle approximated by a regular polygon with `sides` edges.
    Circle {
        center: Point,
        radius: f64,
        sides: u32,
    },
    /// Polygon with one color per vertex; missing entries fall back to the drawable color.
    ColoredPolygon {
        vertices: Vec<Point>,
        colors: Vec<Color>,
    },
    /// Horizontal bar filled to `progress` (`0.0..=1.0`).
    ProgressBar {
        x: f64,
        y: f64,
        width: f64,
        height: f64,
        progress: f64,
    },
}

impl Shape {
    pub fn name(&self) -> &'static str {
        match self {
            Shape::Polyline { .. } => "polyline",
            Shape::Triangle { .. } => "triangle",
            Shape::Rectangle { .. } => "rectangle",
            Shape::Circle { .. } => "circle",
            Shape::ColoredPolygon { .. } => "colored-polygon",
            Shape::ProgressBar { .. } => "progress-bar",
        }
    }

    /// Untransformed outline vertices.
    pub fn vertices(&self) -> Vec<Point> {
        match self {
            Shape::Polyline { points, .. } => points.clone(),
            Shape::Triangle { vertices } => vertices.to_vec(),
            Shape::Rectangle {
                x,
                y,
                width,
                height,
                ..
            } => rect_corners(*x, *y, *width, *height),
            Shape::Circle {
                center,
                radius,
                sides,
            } => {
                let sides = (*sides).max(3);
                (0..sides)
                    .map(|i| {
                        let angle = std::f64::consts::TAU * i as f64 / sides as f64;
                        (
                            center.0 + radius * angle.cos(),
                            center.1 + radius * angle.sin(),
                        )
                    })
                    .collect()
            }
            Shape::ColoredPolygon { vertices, .. } => vertices.clone(),
            Shape::ProgressBar {
                x,
                y,
                width,
                height,
                ..
            } => rect_corners(*x, *y, *width, *height),
        }
    }
}

fn rect_corners(x: f64, y: f64, width: f64, height: f64) -> Vec<Point> {
    vec![
        (x, y),
        (x + width, y),
        (x + width, y + height),
        (x, y + height),
    ]
}

/// One renderable shape instance: geometry, color and transform.
///
/// There are no setters. Once a drawable is handed to the canvas it moves
/// into the queue and is never observed mutably by the submitter again.
#[derive(Clone, Debug, PartialEq)]
pub struct Drawable {
    shape: Shape,
    color: Color,
    transform: Transform,
    tag: u64,
}

impl Drawable {
    pub fn new(shape: Shape, color: Color) -> Self {
        Self {
            shape,
            color,
            transform: Transform::IDENTITY,
            tag: 0,
        }
    }

    pub fn with_transform(mut self, transform: Transform) -> Self {
        self.transform = transform;
        self
    }

    /// Attaches an opaque caller-defined tag (e.g. producer id or sequence number).
    pub fn with_tag(mut self, tag: u64) -> Self {
        self.tag = tag;
        self
    }

    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    pub fn color(&self) -> Color {
        self.color
    }

    pub fn transform(&self) -> &Transform {
        &self.transform
    }

    pub fn tag(&self) -> u64 {
        self.tag
    }

    /// Vertices with the transform applied.
    pub fn world_vertices(&self) -> Vec<Point> {
        self.shape
            .vertices()
            .into_iter()
            .map(|p| self.transform.apply(p))
            .collect()
    }

    pub fn bounds(&self) -> Option<Bounds> {
        Bounds::from_points(&self.world_vertices())
    }

    /// Color for the `index`-th vertex.
    pub fn vertex_color(&self, index: usize) -> Color {
        match &self.shape {
            Shape::ColoredPolygon { colors, .. } => {
                colors.get(index).copied().unwrap_or(self.color)
            }
            _ => self.color,
        }
    }
}
