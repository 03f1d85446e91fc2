use std::io;
use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};

use crossterm::{
    event::{self, Event as CEvent, KeyCode},
    terminal::{disable_raw_mode, enable_raw_mode},
};
use thiserror::Error;
use tui::backend::{Backend, CrosstermBackend};
use tui::layout::{Alignment, Constraint, Direction, Layout, Rect};
use tui::style::{Color, Modifier, Style};
use tui::symbols;
use tui::text::{Span, Spans};
use tui::widgets::{Axis, BarChart, Block, Borders, Chart, Dataset, GraphType, Paragraph, Tabs, Wrap};
use tui::{Frame, Terminal};

use crate::quantile::bucket_index;
use crate::training::TrainingReport;

const TICK_RATE: Duration = Duration::from_millis(200);

#[derive(Debug, Error)]
pub enum ChartError {
    #[error("terminal error: {0}")]
    Terminal(#[from] io::Error),
    #[error("terminal event channel closed")]
    ChannelClosed(#[from] mpsc::RecvError),
}

enum Event<I> {
    Input(I),
    Tick,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum MenuItem {
    Curves,
    Buckets,
}

impl From<MenuItem> for usize {
    fn from(input: MenuItem) -> usize {
        match input {
            MenuItem::Curves => 0,
            MenuItem::Buckets => 1,
        }
    }
}

/// Row counts per quantile bucket of one raw numeric column.
#[derive(Debug, Clone)]
pub struct BucketHistogram {
    pub column: String,
    pub boundaries: Vec<f64>,
    pub labels: Vec<String>,
    pub counts: Vec<u64>,
}

impl BucketHistogram {
    pub fn new(column: &str, values: &[f64], boundaries: Vec<f64>) -> Self {
        let mut counts = vec![0u64; boundaries.len() + 1];
        for value in values {
            counts[bucket_index(&boundaries, *value)] += 1;
        }
        let labels = (0..counts.len())
            .map(|i| match (i.checked_sub(1).map(|j| boundaries[j]), boundaries.get(i)) {
                (None, Some(hi)) => format!("<{}", hi),
                (Some(lo), Some(hi)) => format!("{}-{}", lo, hi),
                (Some(lo), None) => format!(">={}", lo),
                (None, None) => "all".to_string(),
            })
            .collect();
        BucketHistogram {
            column: column.to_string(),
            boundaries,
            labels,
            counts,
        }
    }
}

/// Everything the viewer draws.
pub struct ChartData<'a> {
    pub report: &'a TrainingReport,
    pub histogram: BucketHistogram,
}

impl<'a> ChartData<'a> {
    fn loss_series(losses: &[f64]) -> Vec<(f64, f64)> {
        losses.iter().enumerate().map(|(i, l)| (i as f64, *l)).collect()
    }
}

fn bounds(values: impl Iterator<Item = f64>) -> [f64; 2] {
    let (min, max) = values
        .filter(|v| v.is_finite())
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| (lo.min(v), hi.max(v)));
    if min > max {
        return [0.0, 1.0];
    }
    let pad = ((max - min) * 0.05).max(1e-3);
    [min - pad, max + pad]
}

fn axis_labels(bounds: [f64; 2]) -> Vec<Span<'static>> {
    let mid = (bounds[0] + bounds[1]) / 2.0;
    [bounds[0], mid, bounds[1]]
        .iter()
        .map(|v| Span::raw(format!("{:.2}", v)))
        .collect()
}

fn draw_learning_curve<B: Backend>(f: &mut Frame<B>, area: Rect, data: &ChartData) {
    let training = ChartData::loss_series(&data.report.training_losses);
    let validation = ChartData::loss_series(&data.report.validation_losses);
    let x_bounds = [0.0, (training.len().max(2) - 1) as f64];
    let y_bounds = bounds(training.iter().chain(&validation).map(|(_, l)| *l));

    let datasets = vec![
        Dataset::default()
            .name("training")
            .marker(symbols::Marker::Braille)
            .graph_type(GraphType::Line)
            .style(Style::default().fg(Color::Cyan))
            .data(&training),
        Dataset::default()
            .name("validation")
            .marker(symbols::Marker::Braille)
            .graph_type(GraphType::Line)
            .style(Style::default().fg(Color::Yellow))
            .data(&validation),
    ];
    let chart = Chart::new(datasets)
        .block(Block::default().title("Learning Curve (Loss vs time)").borders(Borders::ALL))
        .x_axis(
            Axis::default()
                .title("Training Periods")
                .bounds(x_bounds)
                .labels(axis_labels(x_bounds)),
        )
        .y_axis(
            Axis::default()
                .title("Loss")
                .bounds(y_bounds)
                .labels(axis_labels(y_bounds)),
        );
    f.render_widget(chart, area);
}

fn draw_roc_curve<B: Backend>(f: &mut Frame<B>, area: Rect, data: &ChartData) {
    let roc = data.report.roc.points();
    let chance = [(0.0, 0.0), (1.0, 1.0)];
    let datasets = vec![
        Dataset::default()
            .name(format!("AUC {:.3}", data.report.auc))
            .marker(symbols::Marker::Braille)
            .graph_type(GraphType::Line)
            .style(Style::default().fg(Color::Green))
            .data(&roc),
        Dataset::default()
            .name("chance")
            .marker(symbols::Marker::Dot)
            .graph_type(GraphType::Line)
            .style(Style::default().fg(Color::DarkGray))
            .data(&chance),
    ];
    let unit = [0.0, 1.0];
    let chart = Chart::new(datasets)
        .block(Block::default().title("ROC Curve on Validation Data").borders(Borders::ALL))
        .x_axis(
            Axis::default()
                .title("false positive rate")
                .bounds(unit)
                .labels(axis_labels(unit)),
        )
        .y_axis(
            Axis::default()
                .title("true positive rate")
                .bounds(unit)
                .labels(axis_labels(unit)),
        );
    f.render_widget(chart, area);
}

fn draw_buckets<B: Backend>(f: &mut Frame<B>, area: Rect, data: &ChartData) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Percentage(80), Constraint::Percentage(20)].as_ref())
        .split(area);

    let histogram = &data.histogram;
    let bars: Vec<(&str, u64)> = histogram
        .labels
        .iter()
        .map(String::as_str)
        .zip(histogram.counts.iter().copied())
        .collect();
    let title = format!("{} by quantile bucket", histogram.column);
    let chart = BarChart::default()
        .block(Block::default().title(title).borders(Borders::ALL))
        .data(&bars)
        .bar_width(7)
        .bar_style(Style::default().fg(Color::Yellow))
        .value_style(Style::default().fg(Color::Black).bg(Color::Yellow));
    f.render_widget(chart, chunks[0]);

    let boundaries = histogram
        .boundaries
        .iter()
        .map(|b| format!("{:.2}", b))
        .collect::<Vec<_>>()
        .join(", ");
    let text = vec![Spans::from(vec![Span::styled(
        format!("boundaries are: [{}]", boundaries),
        Style::default().add_modifier(Modifier::BOLD),
    )])];
    let paragraph = Paragraph::new(text)
        .block(Block::default().title("Quantile Boundaries").borders(Borders::ALL))
        .style(Style::default().fg(Color::Green))
        .alignment(Alignment::Center)
        .wrap(Wrap { trim: true });
    f.render_widget(paragraph, chunks[1]);
}

pub fn draw<B: Backend>(f: &mut Frame<B>, data: &ChartData, active_menu_item: MenuItem) {
    let size = f.size();
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .margin(1)
        .constraints([Constraint::Length(3), Constraint::Min(10)].as_ref())
        .split(size);

    let menu_titles = ["Curves", "Buckets", "Quit"];
    let menu = menu_titles
        .iter()
        .map(|t| {
            let (first, rest) = t.split_at(1);
            Spans::from(vec![
                Span::styled(
                    first,
                    Style::default()
                        .fg(Color::Yellow)
                        .add_modifier(Modifier::UNDERLINED),
                ),
                Span::styled(rest, Style::default().fg(Color::DarkGray)),
            ])
        })
        .collect();
    let tabs = Tabs::new(menu)
        .select(active_menu_item.into())
        .block(Block::default().borders(Borders::ALL))
        .style(Style::default().fg(Color::Cyan))
        .highlight_style(Style::default().fg(Color::Yellow))
        .divider(Span::raw("|"));
    f.render_widget(tabs, chunks[0]);

    match active_menu_item {
        MenuItem::Curves => {
            let graph_chunks = Layout::default()
                .direction(Direction::Horizontal)
                .constraints([Constraint::Percentage(50), Constraint::Percentage(50)].as_ref())
                .split(chunks[1]);
            draw_learning_curve(f, graph_chunks[0], data);
            draw_roc_curve(f, graph_chunks[1], data);
        }
        MenuItem::Buckets => draw_buckets(f, chunks[1], data),
    }
}

/// Runs the chart viewer until `q` is pressed.
pub fn show(data: &ChartData) -> Result<(), ChartError> {
    enable_raw_mode()?;

    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        let mut last_tick = Instant::now();
        loop {
            let timeout = TICK_RATE
                .checked_sub(last_tick.elapsed())
                .unwrap_or_else(|| Duration::from_secs(0));

            match event::poll(timeout) {
                Ok(true) => {
                    if let Ok(CEvent::Key(key)) = event::read() {
                        if tx.send(Event::Input(key)).is_err() {
                            break;
                        }
                    }
                }
                Ok(false) => {}
                Err(_) => break,
            }

            if last_tick.elapsed() >= TICK_RATE {
                if tx.send(Event::Tick).is_err() {
                    break;
                }
                last_tick = Instant::now();
            }
        }
    });

    let result = run_viewer(data, &rx);
    disable_raw_mode()?;
    result
}

fn run_viewer(data: &ChartData, rx: &mpsc::Receiver<Event<event::KeyEvent>>) -> Result<(), ChartError> {
    let stdout = io::stdout();
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;
    terminal.clear()?;

    let mut active_menu_item = MenuItem::Curves;
    loop {
        terminal.draw(|rect| draw(rect, data, active_menu_item))?;

        match rx.recv()? {
            Event::Input(event) => match event.code {
                KeyCode::Char('q') => break,
                KeyCode::Char('c') => active_menu_item = MenuItem::Curves,
                KeyCode::Char('b') => active_menu_item = MenuItem::Buckets,
                _ => {}
            },
            Event::Tick => {}
        }
    }
    terminal.clear()?;
    terminal.show_cursor()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::roc_curve;
    use tui::backend::TestBackend;

    fn report() -> TrainingReport {
        let roc = roc_curve(&[0.0, 1.0, 1.0, 0.0], &[0.2, 0.7, 0.9, 0.4]);
        TrainingReport {
            training_losses: vec![0.69, 0.6, 0.55, 0.52],
            validation_losses: vec![0.69, 0.61, 0.57, 0.55],
            validation_accuracy: 1.0,
            auc: roc.auc(),
            roc,
        }
    }

    fn rendered(terminal: &Terminal<TestBackend>) -> String {
        terminal
            .backend()
            .buffer()
            .content
            .iter()
            .map(|cell| cell.symbol.as_str())
            .collect()
    }

    #[test]
    fn histogram_counts_rows_per_bucket() {
        let values = [17.0, 25.0, 30.0, 33.0, 45.0, 60.0];
        let histogram = BucketHistogram::new("age", &values, vec![25.0, 33.0]);
        assert_eq!(histogram.counts, vec![1, 2, 3]);
        assert_eq!(histogram.labels, vec!["<25", "25-33", ">=33"]);
    }

    #[test]
    fn curves_tab_renders_both_charts() {
        let report = report();
        let data = ChartData {
            report: &report,
            histogram: BucketHistogram::new("age", &[20.0, 40.0], vec![30.0]),
        };
        let mut terminal = Terminal::new(TestBackend::new(160, 40)).unwrap();
        terminal.draw(|f| draw(f, &data, MenuItem::Curves)).unwrap();
        let screen = rendered(&terminal);
        assert!(screen.contains("Learning Curve (Loss vs time)"));
        assert!(screen.contains("ROC Curve on Validation Data"));
    }

    #[test]
    fn buckets_tab_lists_boundaries() {
        let report = report();
        let data = ChartData {
            report: &report,
            histogram: BucketHistogram::new("age", &[20.0, 40.0], vec![30.0]),
        };
        let mut terminal = Terminal::new(TestBackend::new(120, 40)).unwrap();
        terminal.draw(|f| draw(f, &data, MenuItem::Buckets)).unwrap();
        let screen = rendered(&terminal);
        assert!(screen.contains("age by quantile bucket"));
        assert!(screen.contains("boundaries are: [30.00]"));
    }
}
