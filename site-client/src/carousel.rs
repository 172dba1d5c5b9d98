use std::time::Duration;

/// Period after which the site moves on to the next slide on its own.
pub const AUTO_ADVANCE_INTERVAL: Duration = Duration::from_secs(4);

/// The featured image carousel on the landing page.
#[derive(Debug, Clone)]
pub struct Carousel<T> {
    slides: Vec<T>,
    index: usize,
}

/// One dot below the carousel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Indicator {
    pub index: usize,
    pub active: bool,
}

impl<T> Carousel<T> {
    pub fn new(slides: Vec<T>) -> Self {
        Self { slides, index: 0 }
    }

    pub fn current(&self) -> Option<&T> {
        self.slides.get(self.index)
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn len(&self) -> usize {
        self.slides.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slides.is_empty()
    }

    /// Moves to the next slide, wrapping to the first. Called on every auto-advance tick.
    pub fn advance(&mut self) {
        if !self.is_empty() {
            self.index = (self.index + 1) % self.slides.len();
        }
    }

    pub fn previous(&mut self) {
        if !self.is_empty() {
            self.index = (self.index + self.slides.len() - 1) % self.slides.len();
        }
    }

    /// Jumps to the given slide. Indices past the end are ignored.
    pub fn go_to(&mut self, index: usize) {
        if index < self.slides.len() {
            self.index = index;
        }
    }

    pub fn indicators(&self) -> Vec<Indicator> {
        (0..self.slides.len())
            .map(|index| Indicator {
                index,
                active: index == self.index,
            })
            .collect()
    }
}
