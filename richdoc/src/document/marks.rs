/// Highlight mark. `color` is a CSS color; `None` means the default highlight.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct Highlight {
    pub color: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Link {
    pub href: String,
}

/// The kind of a mark, without its attributes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MarkKind {
    Bold,
    Italic,
    Strike,
    Underline,
    Code,
    Highlight,
    Subscript,
    Superscript,
    Link,
}

/// A single mark with its attributes.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Mark {
    Bold,
    Italic,
    Strike,
    Underline,
    Code,
    Highlight(Highlight),
    Subscript,
    Superscript,
    Link(Link),
}

impl Mark {
    pub fn kind(&self) -> MarkKind {
        match self {
            Mark::Bold => MarkKind::Bold,
            Mark::Italic => MarkKind::Italic,
            Mark::Strike => MarkKind::Strike,
            Mark::Underline => MarkKind::Underline,
            Mark::Code => MarkKind::Code,
            Mark::Highlight(_) => MarkKind::Highlight,
            Mark::Subscript => MarkKind::Subscript,
            Mark::Superscript => MarkKind::Superscript,
            Mark::Link(_) => MarkKind::Link,
        }
    }

    pub fn link(href: impl Into<String>) -> Self {
        Mark::Link(Link { href: href.into() })
    }

    pub fn highlight(color: Option<&str>) -> Self {
        Mark::Highlight(Highlight {
            color: color.map(str::to_string),
        })
    }
}

/// The set of marks active on a text run. Marks are attributes, not nesting:
/// each kind is present at most once.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct Marks {
    pub bold: bool,
    pub italic: bool,
    pub strike: bool,
    pub underline: bool,
    pub code: bool,
    pub subscript: bool,
    pub superscript: bool,
    pub highlight: Option<Highlight>,
    pub link: Option<Link>,
}

impl Marks {
    pub fn is_empty(&self) -> bool {
        *self == Marks::default()
    }

    pub fn has(&self, kind: MarkKind) -> bool {
        match kind {
            MarkKind::Bold => self.bold,
            MarkKind::Italic => self.italic,
            MarkKind::Strike => self.strike,
            MarkKind::Underline => self.underline,
            MarkKind::Code => self.code,
            MarkKind::Subscript => self.subscript,
            MarkKind::Superscript => self.superscript,
            MarkKind::Highlight => self.highlight.is_some(),
            MarkKind::Link => self.link.is_some(),
        }
    }

    /// True when the exact mark (kind and attributes) is present.
    pub fn contains(&self, mark: &Mark) -> bool {
        match mark {
            Mark::Highlight(h) => self.highlight.as_ref() == Some(h),
            Mark::Link(l) => self.link.as_ref() == Some(l),
            other => self.has(other.kind()),
        }
    }

    /// Add a mark, replacing any mark of the same kind.
    pub fn insert(&mut self, mark: Mark) {
        match mark {
            Mark::Bold => self.bold = true,
            Mark::Italic => self.italic = true,
            Mark::Strike => self.strike = true,
            Mark::Underline => self.underline = true,
            Mark::Code => self.code = true,
            Mark::Subscript => {
                self.subscript = true;
                self.superscript = false;
            }
            Mark::Superscript => {
                self.superscript = true;
                self.subscript = false;
            }
            Mark::Highlight(h) => self.highlight = Some(h),
            Mark::Link(l) => self.link = Some(l),
        }
    }

    pub fn remove(&mut self, kind: MarkKind) {
        match kind {
            MarkKind::Bold => self.bold = false,
            MarkKind::Italic => self.italic = false,
            MarkKind::Strike => self.strike = false,
            MarkKind::Underline => self.underline = false,
            MarkKind::Code => self.code = false,
            MarkKind::Subscript => self.subscript = false,
            MarkKind::Superscript => self.superscript = false,
            MarkKind::Highlight => self.highlight = None,
            MarkKind::Link => self.link = None,
        }
    }

    pub fn with(mut self, mark: Mark) -> Self {
        self.insert(mark);
        self
    }

    /// Marks in their stable transport order.
    pub fn to_vec(&self) -> Vec<Mark> {
        let mut out = Vec::new();
        if self.bold {
            out.push(Mark::Bold);
        }
        if self.italic {
            out.push(Mark::Italic);
        }
        if self.strike {
            out.push(Mark::Strike);
        }
        if self.underline {
            out.push(Mark::Underline);
        }
        if self.code {
            out.push(Mark::Code);
        }
        if let Some(h) = &self.highlight {
            out.push(Mark::Highlight(h.clone()));
        }
        if self.subscript {
            out.push(Mark::Subscript);
        }
        if self.superscript {
            out.push(Mark::Superscript);
        }
        if let Some(l) = &self.link {
            out.push(Mark::Link(l.clone()));
        }
        out
    }
}

impl FromIterator<Mark> for Marks {
    fn from_iter<I: IntoIterator<Item = Mark>>(iter: I) -> Self {
        let mut marks = Marks::default();
        for mark in iter {
            marks.insert(mark);
        }
        marks
    }
}
