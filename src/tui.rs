use crate::ledger::parse_quantity;
use crate::metrics::{market_summary, price_bounds, GroupQuote};
use crate::report::{format_currency, format_delta, format_with_commas};
use crate::session::Session;
use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    symbols,
    text::{Line, Span},
    widgets::{
        Axis, Block, Borders, Cell, Chart, Clear, Dataset, GraphType, List, ListItem, ListState,
        Paragraph, Row, Table, Tabs, Wrap,
    },
    Frame, Terminal,
};
use std::collections::HashSet;
use std::io::{self, Stdout};
use std::str::FromStr;
use std::time::{Duration, Instant};
use tracing::{error, info, warn};
use tui_big_text::{BigText, PixelSize};

const CARD_COLUMNS: usize = 3;
const CARD_HEIGHT: u16 = 4;
const BLINK_INTERVAL: Duration = Duration::from_millis(500);

const SERIES_COLORS: [Color; 8] = [
    Color::Cyan,
    Color::Yellow,
    Color::Magenta,
    Color::Green,
    Color::LightRed,
    Color::LightBlue,
    Color::LightCyan,
    Color::LightMagenta,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Component {
    TabBar,
    Balance,
    Groups,
    Holdings,
    Summary,
    Chart,
    Help,
}

impl Component {
    /// Returns all available components
    pub fn all() -> Vec<Component> {
        vec![
            Component::TabBar,
            Component::Balance,
            Component::Groups,
            Component::Holdings,
            Component::Summary,
            Component::Chart,
            Component::Help,
        ]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Component::TabBar => "tab_bar",
            Component::Balance => "balance",
            Component::Groups => "groups",
            Component::Holdings => "holdings",
            Component::Summary => "summary",
            Component::Chart => "chart",
            Component::Help => "help",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Component::TabBar => "Top navigation bar showing active tab",
            Component::Balance => "Cash balance and net worth header",
            Component::Groups => "Group list with latest prices",
            Component::Holdings => "Shares currently held",
            Component::Summary => "Latest price and change per group",
            Component::Chart => "Price history chart",
            Component::Help => "Keyboard shortcuts",
        }
    }
}

impl FromStr for Component {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Component::all()
            .into_iter()
            .find(|c| c.as_str() == s.trim().to_lowercase())
            .ok_or_else(|| format!("Unknown component: '{s}'"))
    }
}

impl std::fmt::Display for Component {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Default)]
pub struct DisabledComponents {
    disabled: HashSet<Component>,
}

impl DisabledComponents {
    pub fn new(disabled_list: &[String]) -> Self {
        let mut disabled = HashSet::new();

        for component_str in disabled_list {
            match Component::from_str(component_str) {
                Ok(component) => {
                    disabled.insert(component);
                }
                Err(err) => warn!("{err}"),
            }
        }

        DisabledComponents { disabled }
    }

    pub fn is_disabled(&self, component: Component) -> bool {
        self.disabled.contains(&component)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Tab {
    Market,
    Portfolio,
}

impl Tab {
    fn title(self) -> &'static str {
        match self {
            Tab::Market => "Market",
            Tab::Portfolio => "Portfolio",
        }
    }

    fn all() -> &'static [Tab] {
        &[Tab::Market, Tab::Portfolio]
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AppMode {
    Normal,
    Buy,
}

/// Inline feedback line shown under the trade panel.
#[derive(Debug, Clone, PartialEq)]
pub enum Status {
    Info(String),
    Success(String),
    Failure(String),
}

pub struct App {
    pub session: Session,
    pub current_tab: Tab,
    pub mode: AppMode,
    pub should_quit: bool,
    pub currency: String,
    pub selected_group: usize,
    pub quantity_input: String,
    pub cursor_period: usize,
    pub status: Option<Status>,
    pub load_error: Option<String>,
    pub last_reload: Instant,
    pub last_blink: Instant,
    pub flash_state: bool,
    pub disabled_components: DisabledComponents,
}

impl App {
    pub fn new(session: Session, currency: String, disabled_components: DisabledComponents) -> App {
        let cursor_period = session.table().period_count() - 1;
        App {
            session,
            current_tab: Tab::Market,
            mode: AppMode::Normal,
            should_quit: false,
            currency,
            selected_group: 0,
            quantity_input: String::new(),
            cursor_period,
            status: None,
            load_error: None,
            last_reload: Instant::now(),
            last_blink: Instant::now(),
            flash_state: false,
            disabled_components,
        }
    }

    pub fn selected_group_name(&self) -> Option<&str> {
        self.session
            .table()
            .groups()
            .get(self.selected_group)
            .map(String::as_str)
    }

    pub fn next_tab(&mut self) {
        let tabs = Tab::all();
        let current_index = tabs
            .iter()
            .position(|&t| t == self.current_tab)
            .unwrap_or(0);
        self.current_tab = tabs[(current_index + 1) % tabs.len()];
    }

    pub fn previous_tab(&mut self) {
        let tabs = Tab::all();
        let current_index = tabs
            .iter()
            .position(|&t| t == self.current_tab)
            .unwrap_or(0);
        self.current_tab = tabs[(current_index + tabs.len() - 1) % tabs.len()];
    }

    pub fn select_next(&mut self) {
        let count = self.session.table().groups().len();
        if self.selected_group < count.saturating_sub(1) {
            self.selected_group += 1;
        }
    }

    pub fn select_previous(&mut self) {
        self.selected_group = self.selected_group.saturating_sub(1);
    }

    pub fn cursor_next(&mut self) {
        if self.cursor_period + 1 < self.session.table().period_count() {
            self.cursor_period += 1;
        }
    }

    pub fn cursor_previous(&mut self) {
        self.cursor_period = self.cursor_period.saturating_sub(1);
    }

    pub fn enter_buy_mode(&mut self) {
        if self.selected_group_name().is_some() {
            self.mode = AppMode::Buy;
            self.quantity_input = "1".to_string();
        }
    }

    pub fn exit_buy_mode(&mut self) {
        self.mode = AppMode::Normal;
        self.quantity_input.clear();
    }

    /// Runs the purchase typed into the buy dialog.
    ///
    /// Input errors keep the dialog open; ledger outcomes close it.
    pub fn confirm_purchase(&mut self) {
        let Some(group) = self.selected_group_name().map(str::to_string) else {
            self.exit_buy_mode();
            return;
        };

        let quantity = match parse_quantity(&self.quantity_input) {
            Ok(q) => q,
            Err(e) => {
                self.status = Some(Status::Failure(e.to_string()));
                return;
            }
        };

        match self.session.execute_purchase(&group, quantity) {
            Ok(purchase) => {
                self.status = Some(Status::Success(format!(
                    "Bought {} x {} for {} ({} held)",
                    purchase.quantity,
                    purchase.group,
                    format_currency(purchase.cost, &self.currency),
                    purchase.holding
                )));
            }
            Err(e) => {
                self.status = Some(Status::Failure(e.to_string()));
            }
        }
        self.exit_buy_mode();
    }

    /// Re-reads the price file. A failure blocks the dashboard until a reload
    /// succeeds.
    pub fn reload(&mut self) {
        match self.session.reload() {
            Ok(summary) => {
                self.load_error = None;
                let table = self.session.table();
                self.selected_group = self
                    .selected_group
                    .min(table.groups().len().saturating_sub(1));
                self.cursor_period = table.period_count() - 1;
                self.last_reload = Instant::now();

                let mut message = "Price data reloaded".to_string();
                if !summary.added.is_empty() {
                    message.push_str(&format!(" | new: {}", summary.added.join(", ")));
                }
                if !summary.dropped.is_empty() {
                    let dropped: Vec<String> = summary
                        .dropped
                        .iter()
                        .map(|(g, q)| format!("{g} ({q})"))
                        .collect();
                    message.push_str(&format!(" | dropped: {}", dropped.join(", ")));
                }
                info!("{message}");
                self.status = Some(Status::Info(message));
            }
            Err(e) => {
                error!(error = %e, "reload failed");
                self.exit_buy_mode();
                self.load_error = Some(e.to_string());
            }
        }
    }

    pub fn tick(&mut self) {
        if self.last_blink.elapsed() >= BLINK_INTERVAL {
            self.flash_state = !self.flash_state;
            self.last_blink = Instant::now();
        }
    }

    pub fn handle_key(&mut self, code: KeyCode) {
        if self.load_error.is_some() {
            match code {
                KeyCode::Char('q') | KeyCode::Esc => self.should_quit = true,
                KeyCode::Char('r') => self.reload(),
                _ => {}
            }
            return;
        }

        match self.mode {
            AppMode::Normal => match code {
                KeyCode::Char('q') | KeyCode::Esc => {
                    self.should_quit = true;
                }
                KeyCode::Char('h') | KeyCode::Left | KeyCode::BackTab => {
                    self.previous_tab();
                }
                KeyCode::Char('l') | KeyCode::Right | KeyCode::Tab => {
                    self.next_tab();
                }
                KeyCode::Char('j') | KeyCode::Down => self.select_next(),
                KeyCode::Char('k') | KeyCode::Up => self.select_previous(),
                KeyCode::Char('[') => self.cursor_previous(),
                KeyCode::Char(']') => self.cursor_next(),
                KeyCode::Char('b') | KeyCode::Enter => self.enter_buy_mode(),
                KeyCode::Char('r') => self.reload(),
                KeyCode::Char('1') => self.current_tab = Tab::Market,
                KeyCode::Char('2') => self.current_tab = Tab::Portfolio,
                _ => {}
            },
            AppMode::Buy => match code {
                KeyCode::Esc => self.exit_buy_mode(),
                KeyCode::Enter => self.confirm_purchase(),
                KeyCode::Backspace => {
                    self.quantity_input.pop();
                }
                KeyCode::Char(c) if c.is_ascii_digit() => {
                    self.quantity_input.push(c);
                }
                _ => {}
            },
        }
    }

    fn delta_color(&self, delta: f64) -> Color {
        if delta > 0.0 {
            if self.flash_state {
                Color::LightGreen
            } else {
                Color::Green
            }
        } else if delta < 0.0 {
            if self.flash_state {
                Color::LightRed
            } else {
                Color::Red
            }
        } else {
            Color::White
        }
    }
}

pub fn run_tui(
    session: Session,
    currency: String,
    disabled_components: &[String],
) -> eyre::Result<()> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let disabled = DisabledComponents::new(disabled_components);
    let mut app = App::new(session, currency, disabled);

    let res = run_app(&mut terminal, &mut app);

    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    res?;
    Ok(())
}

fn run_app(terminal: &mut Terminal<CrosstermBackend<Stdout>>, app: &mut App) -> io::Result<()> {
    loop {
        terminal.draw(|f| ui(f, app))?;

        if event::poll(Duration::from_millis(100))? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    app.handle_key(key.code);
                }
            }
        }
        app.tick();

        if app.should_quit {
            break;
        }
    }
    Ok(())
}

fn ui(f: &mut Frame, app: &App) {
    if let Some(error) = &app.load_error {
        render_load_error(f, error);
        return;
    }

    let show_tabs = !app.disabled_components.is_disabled(Component::TabBar);
    let show_header = !app.disabled_components.is_disabled(Component::Balance);
    let show_help = !app.disabled_components.is_disabled(Component::Help);

    let mut constraints = Vec::new();
    if show_tabs {
        constraints.push(Constraint::Length(3));
    }
    if show_header {
        constraints.push(Constraint::Length(6));
    }
    constraints.push(Constraint::Min(0));
    if show_help {
        constraints.push(Constraint::Length(3));
    }

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints(constraints)
        .split(f.area());
    let mut chunk_index = 0;

    if show_tabs {
        let tab_titles: Vec<Line> = Tab::all()
            .iter()
            .map(|t| {
                let style = if *t == app.current_tab {
                    Style::default()
                        .fg(Color::Yellow)
                        .add_modifier(Modifier::BOLD)
                } else {
                    Style::default().fg(Color::White)
                };
                Line::from(Span::styled(t.title(), style))
            })
            .collect();

        let tabs = Tabs::new(tab_titles)
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .title("Market Simulator"),
            )
            .style(Style::default().fg(Color::White))
            .highlight_style(Style::default().fg(Color::Yellow))
            .select(
                Tab::all()
                    .iter()
                    .position(|&t| t == app.current_tab)
                    .unwrap_or(0),
            );

        f.render_widget(tabs, chunks[chunk_index]);
        chunk_index += 1;
    }

    if show_header {
        render_header(f, chunks[chunk_index], app);
        chunk_index += 1;
    }

    let body = chunks[chunk_index];
    chunk_index += 1;

    let show_sidebar = !app.disabled_components.is_disabled(Component::Groups)
        || !app.disabled_components.is_disabled(Component::Holdings);
    let main_area = if show_sidebar {
        let body_chunks = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Length(34), Constraint::Min(0)])
            .split(body);
        render_sidebar(f, body_chunks[0], app);
        body_chunks[1]
    } else {
        body
    };

    match app.current_tab {
        Tab::Market => render_market(f, main_area, app),
        Tab::Portfolio => render_portfolio(f, main_area, app),
    }

    if show_help {
        let help = match app.mode {
            AppMode::Normal => "h/l (tabs) | j/k (group) | b (buy) | [ ] (period) | r (reload) | q (quit)",
            AppMode::Buy => "Buy: digits (quantity) | Enter (confirm) | Esc (cancel)",
        };
        let help_text = Paragraph::new(help)
            .block(Block::default().borders(Borders::ALL).title("Help"))
            .style(Style::default().fg(Color::Gray))
            .alignment(Alignment::Center);
        f.render_widget(help_text, chunks[chunk_index]);
    }

    if app.mode == AppMode::Buy {
        render_buy_dialog(f, app);
    }
}

fn render_header(f: &mut Frame, area: Rect, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(60), Constraint::Percentage(40)])
        .split(area);

    let balance_text = format_currency(app.session.balance(), &app.currency);
    let big_text = BigText::builder()
        .pixel_size(PixelSize::Quadrant)
        .style(
            Style::default()
                .fg(Color::Green)
                .add_modifier(Modifier::BOLD),
        )
        .lines(vec![balance_text.clone().into()])
        .build();

    let balance_block = Block::default()
        .borders(Borders::ALL)
        .title(format!("Available Balance ({balance_text})"))
        .title_alignment(Alignment::Center);
    let inner = balance_block.inner(chunks[0]);
    f.render_widget(balance_block, chunks[0]);
    f.render_widget(big_text, inner);

    let table = app.session.table();
    let latest_period = &table.periods()[table.period_count() - 1];
    let stats = vec![
        Line::from(vec![
            Span::styled("Holdings value: ", Style::default().fg(Color::Gray)),
            Span::raw(format_currency(app.session.holdings_value(), &app.currency)),
        ]),
        Line::from(vec![
            Span::styled("Net worth:      ", Style::default().fg(Color::Gray)),
            Span::styled(
                format_currency(app.session.net_worth(), &app.currency),
                Style::default().add_modifier(Modifier::BOLD),
            ),
        ]),
        Line::from(vec![
            Span::styled("Latest period:  ", Style::default().fg(Color::Gray)),
            Span::raw(latest_period.as_str()),
            Span::styled(
                format!("  (reloaded {}s ago)", app.last_reload.elapsed().as_secs()),
                Style::default().fg(Color::DarkGray),
            ),
        ]),
    ];
    let stats_widget = Paragraph::new(stats).block(
        Block::default()
            .borders(Borders::ALL)
            .title(app.session.source().display().to_string()),
    );
    f.render_widget(stats_widget, chunks[1]);
}

fn render_sidebar(f: &mut Frame, area: Rect, app: &App) {
    let show_groups = !app.disabled_components.is_disabled(Component::Groups);
    let show_holdings = !app.disabled_components.is_disabled(Component::Holdings);

    let mut constraints = Vec::new();
    if show_groups {
        constraints.push(Constraint::Min(6));
        constraints.push(Constraint::Length(5));
    }
    if show_holdings {
        constraints.push(Constraint::Percentage(35));
    }
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints(constraints)
        .split(area);
    let mut chunk_index = 0;

    if show_groups {
        render_groups(f, chunks[chunk_index], app);
        render_trade_panel(f, chunks[chunk_index + 1], app);
        chunk_index += 2;
    }
    if show_holdings {
        render_holdings(f, chunks[chunk_index], app);
    }
}

fn render_groups(f: &mut Frame, area: Rect, app: &App) {
    let table = app.session.table();
    let items: Vec<ListItem> = table
        .groups()
        .iter()
        .map(|group| {
            let price = table.latest_price(group).unwrap_or(0.0);
            ListItem::new(Line::from(vec![
                Span::raw(format!("{group:<18}")),
                Span::styled(format!("{price:>10.2}"), Style::default().fg(Color::Cyan)),
            ]))
        })
        .collect();

    let list = List::new(items)
        .block(Block::default().borders(Borders::ALL).title("Groups"))
        .highlight_style(Style::default().bg(Color::DarkGray))
        .highlight_symbol("> ");

    let mut state = ListState::default().with_selected(Some(app.selected_group));
    f.render_stateful_widget(list, area, &mut state);
}

fn render_trade_panel(f: &mut Frame, area: Rect, app: &App) {
    let mut lines = Vec::new();
    if let Some(group) = app.selected_group_name() {
        if let Ok(price) = app.session.current_price(group) {
            lines.push(Line::from(vec![
                Span::raw(format!("{group}: ")),
                Span::styled(
                    format!("{price:.2}"),
                    Style::default().add_modifier(Modifier::BOLD),
                ),
                Span::styled("  [b] buy", Style::default().fg(Color::DarkGray)),
            ]));
        }
    }

    let status_line = match &app.status {
        Some(Status::Success(m)) => Line::styled(m.clone(), Style::default().fg(Color::Green)),
        Some(Status::Failure(m)) => Line::styled(m.clone(), Style::default().fg(Color::Red)),
        Some(Status::Info(m)) => Line::styled(m.clone(), Style::default().fg(Color::Yellow)),
        None => Line::raw(""),
    };
    lines.push(status_line);

    let panel = Paragraph::new(lines)
        .block(Block::default().borders(Borders::ALL).title("Trade"))
        .wrap(Wrap { trim: true });
    f.render_widget(panel, area);
}

fn render_holdings(f: &mut Frame, area: Rect, app: &App) {
    let holdings = app.session.non_zero_holdings();
    let items: Vec<ListItem> = if holdings.is_empty() {
        vec![ListItem::new(Span::styled(
            "No shares yet",
            Style::default().fg(Color::DarkGray),
        ))]
    } else {
        holdings
            .iter()
            .map(|(group, quantity)| ListItem::new(format!("• {group}: {quantity} shares")))
            .collect()
    };

    let list = List::new(items).block(Block::default().borders(Borders::ALL).title("Your Holdings"));
    f.render_widget(list, area);
}

fn render_market(f: &mut Frame, area: Rect, app: &App) {
    let show_summary = !app.disabled_components.is_disabled(Component::Summary);
    let show_chart = !app.disabled_components.is_disabled(Component::Chart);

    if !show_summary && !show_chart {
        let placeholder = Paragraph::new("All market components are disabled")
            .block(Block::default().borders(Borders::ALL).title("Market"))
            .style(Style::default().fg(Color::Gray))
            .alignment(Alignment::Center);
        f.render_widget(placeholder, area);
        return;
    }

    let quotes = market_summary(app.session.table());

    let mut constraints = Vec::new();
    if show_summary {
        if show_chart {
            constraints.push(Constraint::Length(summary_height(quotes.len())));
        } else {
            constraints.push(Constraint::Min(0));
        }
    }
    if show_chart {
        constraints.push(Constraint::Min(10));
    }
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints(constraints)
        .split(area);
    let mut chunk_index = 0;

    if show_summary {
        render_summary(f, chunks[chunk_index], &quotes, app);
        chunk_index += 1;
    }
    if show_chart {
        render_chart(f, chunks[chunk_index], app);
    }
}

/// Height of the summary block including its border, saturating at `u16::MAX`.
fn summary_height(group_count: usize) -> u16 {
    let card_rows = u16::try_from(group_count.div_ceil(CARD_COLUMNS)).unwrap_or(u16::MAX);
    card_rows.saturating_mul(CARD_HEIGHT).saturating_add(2)
}

fn render_summary(f: &mut Frame, area: Rect, quotes: &[GroupQuote], app: &App) {
    let block = Block::default()
        .borders(Borders::ALL)
        .title("Market Summary");
    let inner = block.inner(area);
    f.render_widget(block, area);

    // only the rows that fit
    let visible_rows = usize::from(inner.height / CARD_HEIGHT);
    let rows: Vec<&[GroupQuote]> = quotes.chunks(CARD_COLUMNS).take(visible_rows).collect();
    let row_areas = Layout::default()
        .direction(Direction::Vertical)
        .constraints(vec![Constraint::Length(CARD_HEIGHT); rows.len()])
        .split(inner);

    for (row_area, row) in row_areas.iter().zip(rows) {
        let card_areas = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Ratio(1, CARD_COLUMNS as u32); CARD_COLUMNS])
            .split(*row_area);
        for (card_area, quote) in card_areas.iter().zip(row) {
            render_card(f, *card_area, quote, app);
        }
    }
}

fn render_card(f: &mut Frame, area: Rect, quote: &GroupQuote, app: &App) {
    let color = app.delta_color(quote.delta);
    let arrow = if quote.delta > 0.0 {
        "▲"
    } else if quote.delta < 0.0 {
        "▼"
    } else {
        "•"
    };
    let pct = quote
        .percent_change
        .map(|p| format!(" ({p:.2}%)"))
        .unwrap_or_default();

    let lines = vec![
        Line::styled(
            format_with_commas(quote.price),
            Style::default().add_modifier(Modifier::BOLD),
        ),
        Line::styled(
            format!("{arrow} {}{pct}", format_delta(quote.delta)),
            Style::default().fg(color),
        ),
    ];
    let card = Paragraph::new(lines)
        .alignment(Alignment::Center)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(quote.group.as_str())
                .title_alignment(Alignment::Center),
        );
    f.render_widget(card, area);
}

fn render_chart(f: &mut Frame, area: Rect, app: &App) {
    let table = app.session.table();
    let periods = table.periods();
    let n = periods.len();
    let selected = app.selected_group_name();
    let cursor = app.cursor_period.min(n - 1);

    let series: Vec<(&str, Vec<(f64, f64)>)> = table
        .groups()
        .iter()
        .map(|group| {
            let points = table
                .series(group)
                .unwrap_or_default()
                .into_iter()
                .enumerate()
                .map(|(i, p)| (i as f64, p))
                .collect();
            (group.as_str(), points)
        })
        .collect();

    let cursor_point: Vec<(f64, f64)> = selected
        .and_then(|g| table.price(cursor, g))
        .map(|p| vec![(cursor as f64, p)])
        .unwrap_or_default();

    let mut datasets: Vec<Dataset> = series
        .iter()
        .enumerate()
        .map(|(i, (group, points))| {
            let mut style = Style::default().fg(SERIES_COLORS[i % SERIES_COLORS.len()]);
            if Some(*group) == selected {
                style = style.add_modifier(Modifier::BOLD);
            }
            Dataset::default()
                .name(*group)
                .marker(symbols::Marker::Braille)
                .graph_type(GraphType::Line)
                .style(style)
                .data(points)
        })
        .collect();
    datasets.push(
        Dataset::default()
            .marker(symbols::Marker::Block)
            .graph_type(GraphType::Scatter)
            .style(Style::default().fg(Color::White))
            .data(&cursor_point),
    );

    let (lo, hi) = price_bounds(table);
    let pad = ((hi - lo) * 0.05).max(0.5);
    let y_bounds = [(lo - pad).max(0.0), hi + pad];
    let x_max = n.saturating_sub(1).max(1) as f64;

    let mut x_labels = vec![periods[0].clone()];
    if n > 2 {
        x_labels.push(periods[(n - 1) / 2].clone());
    }
    if n > 1 {
        x_labels.push(periods[n - 1].clone());
    }

    let tooltip = selected
        .and_then(|g| table.price(cursor, g).map(|p| (g, p)))
        .map(|(g, p)| format!(" | {} · {g} · {p:.2}", periods[cursor]))
        .unwrap_or_default();

    let chart = Chart::new(datasets)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(format!("Price History{tooltip}")),
        )
        .x_axis(
            Axis::default()
                .title(table.period_column())
                .style(Style::default().fg(Color::Gray))
                .bounds([0.0, x_max])
                .labels(x_labels),
        )
        .y_axis(
            Axis::default()
                .title("Price")
                .style(Style::default().fg(Color::Gray))
                .bounds(y_bounds)
                .labels(vec![
                    format!("{:.1}", y_bounds[0]),
                    format!("{:.1}", (y_bounds[0] + y_bounds[1]) / 2.0),
                    format!("{:.1}", y_bounds[1]),
                ]),
        );

    f.render_widget(chart, area);
}

fn render_portfolio(f: &mut Frame, area: Rect, app: &App) {
    let table = app.session.table();
    let ledger = app.session.ledger();

    let header_cells = ["Group", "Shares", "Price", "Value"].iter().map(|h| {
        Cell::from(*h).style(
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD),
        )
    });
    let header = Row::new(header_cells).height(1).bottom_margin(1);

    let rows = table.groups().iter().enumerate().map(|(i, group)| {
        let quantity = ledger.holding(group);
        let price = table.latest_price(group).unwrap_or(0.0);
        let row_style = if i == app.selected_group {
            Style::default().bg(Color::DarkGray)
        } else {
            Style::default()
        };
        let fg = if quantity > 0 {
            Color::White
        } else {
            Color::DarkGray
        };
        Row::new(vec![
            Cell::from(group.as_str()),
            Cell::from(quantity.to_string()),
            Cell::from(format_currency(price, &app.currency)),
            Cell::from(format_currency(quantity as f64 * price, &app.currency)),
        ])
        .style(row_style.fg(fg))
    });

    let cash_row = Row::new(vec![
        Cell::from("Cash").style(Style::default().fg(Color::Green)),
        Cell::from(""),
        Cell::from(""),
        Cell::from(format_currency(app.session.balance(), &app.currency)),
    ]);
    let total_row = Row::new(vec![
        Cell::from("TOTAL").style(
            Style::default()
                .fg(Color::Green)
                .add_modifier(Modifier::BOLD),
        ),
        Cell::from(""),
        Cell::from(""),
        Cell::from(format_currency(app.session.net_worth(), &app.currency)).style(
            Style::default()
                .fg(Color::Green)
                .add_modifier(Modifier::BOLD),
        ),
    ]);

    let widths = [
        Constraint::Percentage(30),
        Constraint::Percentage(20),
        Constraint::Percentage(25),
        Constraint::Percentage(25),
    ];
    let widget = Table::new(rows.chain([cash_row, total_row]), widths)
        .header(header)
        .block(Block::default().borders(Borders::ALL).title("Portfolio"))
        .style(Style::default().fg(Color::White));

    f.render_widget(widget, area);
}

fn render_buy_dialog(f: &mut Frame, app: &App) {
    let Some(group) = app.selected_group_name() else {
        return;
    };
    let Ok(price) = app.session.current_price(group) else {
        return;
    };

    let popup_area = centered_rect(50, 40, f.area());
    f.render_widget(Clear, popup_area);

    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(2),
            Constraint::Length(3),
            Constraint::Length(2),
            Constraint::Min(0),
        ])
        .margin(1)
        .split(popup_area);

    let main_block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan))
        .title(" Buy Shares ")
        .title_alignment(Alignment::Center)
        .style(Style::default().bg(Color::Black));
    f.render_widget(main_block, popup_area);

    let info = Paragraph::new(format!(
        "{group} at {}",
        format_currency(price, &app.currency)
    ))
    .style(
        Style::default()
            .fg(Color::White)
            .add_modifier(Modifier::BOLD),
    )
    .alignment(Alignment::Center);
    f.render_widget(info, popup_layout[0]);

    let cursor = if app.flash_state { "█" } else { "▌" };
    let input_field = Paragraph::new(format!("{}{cursor}", app.quantity_input))
        .style(
            Style::default()
                .fg(Color::White)
                .add_modifier(Modifier::BOLD),
        )
        .alignment(Alignment::Center)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::Yellow))
                .title(" Quantity "),
        );
    f.render_widget(input_field, popup_layout[1]);

    let (preview_text, preview_style) = match parse_quantity(&app.quantity_input) {
        Ok(quantity) => {
            let cost = quantity as f64 * price;
            if cost > app.session.balance() {
                (
                    format!(
                        "Cost {} exceeds balance",
                        format_currency(cost, &app.currency)
                    ),
                    Style::default().fg(Color::Red),
                )
            } else {
                (
                    format!(
                        "Cost {} | Remaining {}",
                        format_currency(cost, &app.currency),
                        format_currency(app.session.balance() - cost, &app.currency)
                    ),
                    Style::default().fg(Color::Green),
                )
            }
        }
        Err(e) => (e.to_string(), Style::default().fg(Color::Yellow)),
    };
    let preview = Paragraph::new(preview_text)
        .style(preview_style)
        .alignment(Alignment::Center);
    f.render_widget(preview, popup_layout[2]);

    let instructions = Paragraph::new("Enter: Buy | Esc: Cancel")
        .style(Style::default().fg(Color::Cyan))
        .alignment(Alignment::Center);
    f.render_widget(instructions, popup_layout[3]);
}

fn render_load_error(f: &mut Frame, error: &str) {
    let popup_area = centered_rect(60, 30, f.area());
    f.render_widget(Clear, popup_area);

    let text = vec![
        Line::raw(error.to_string()),
        Line::raw(""),
        Line::styled(
            "Fix the price file, then press r to reload or q to quit",
            Style::default().fg(Color::Gray),
        ),
    ];
    let error_paragraph = Paragraph::new(text)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title("Price data unavailable")
                .style(Style::default().fg(Color::Red)),
        )
        .style(Style::default().fg(Color::White))
        .alignment(Alignment::Center)
        .wrap(Wrap { trim: true });

    f.render_widget(error_paragraph, popup_area);
}

fn centered_rect(percent_x: u16, percent_y: u16, r: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(r);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1])[1]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::STARTING_BALANCE;
    use crate::price_table::PriceTable;
    use ratatui::backend::TestBackend;

    fn app(data: &str) -> App {
        let table = PriceTable::from_reader(data.as_bytes()).unwrap();
        let session = Session::from_table("missing_source.csv", table, STARTING_BALANCE).unwrap();
        App::new(session, "SAR".to_string(), DisabledComponents::default())
    }

    fn render(app: &App) -> String {
        let mut terminal = Terminal::new(TestBackend::new(140, 50)).unwrap();
        terminal.draw(|f| ui(f, app)).unwrap();
        terminal
            .backend()
            .buffer()
            .content()
            .iter()
            .map(|c| c.symbol())
            .collect()
    }

    fn type_keys(app: &mut App, keys: &str) {
        for c in keys.chars() {
            app.handle_key(KeyCode::Char(c));
        }
    }

    #[test]
    fn test_component_from_str() {
        assert_eq!(Component::from_str("chart"), Ok(Component::Chart));
        assert_eq!(Component::from_str(" Tab_Bar "), Ok(Component::TabBar));
        assert!(Component::from_str("sidebar").is_err());
        for c in Component::all() {
            assert_eq!(Component::from_str(c.as_str()), Ok(c));
            assert!(!c.description().is_empty());
        }
    }

    #[test]
    fn test_disabled_components() {
        let disabled = DisabledComponents::new(&["chart".to_string(), "bogus".to_string()]);
        assert!(disabled.is_disabled(Component::Chart));
        assert!(!disabled.is_disabled(Component::Summary));
    }

    #[test]
    fn test_tab_navigation() {
        let mut app = app("Week,A\nW1,10\n");
        assert_eq!(app.current_tab, Tab::Market);
        app.handle_key(KeyCode::Char('l'));
        assert_eq!(app.current_tab, Tab::Portfolio);
        app.handle_key(KeyCode::Char('l'));
        assert_eq!(app.current_tab, Tab::Market);
        app.handle_key(KeyCode::Char('h'));
        assert_eq!(app.current_tab, Tab::Portfolio);
        app.handle_key(KeyCode::Char('1'));
        assert_eq!(app.current_tab, Tab::Market);
    }

    #[test]
    fn test_group_selection_is_bounded() {
        let mut app = app("Week,A,B\nW1,10,20\n");
        assert_eq!(app.selected_group_name(), Some("A"));
        app.handle_key(KeyCode::Char('j'));
        app.handle_key(KeyCode::Char('j'));
        assert_eq!(app.selected_group_name(), Some("B"));
        app.handle_key(KeyCode::Char('k'));
        app.handle_key(KeyCode::Char('k'));
        assert_eq!(app.selected_group_name(), Some("A"));
    }

    #[test]
    fn test_period_cursor() {
        let mut app = app("Week,A\nW1,10\nW2,12\nW3,11\n");
        assert_eq!(app.cursor_period, 2);
        app.handle_key(KeyCode::Char(']'));
        assert_eq!(app.cursor_period, 2);
        type_keys(&mut app, "[[[");
        assert_eq!(app.cursor_period, 0);
    }

    #[test]
    fn test_buy_flow() {
        let mut app = app("Week,A\nW1,10\nW2,12\n");
        app.handle_key(KeyCode::Char('b'));
        assert_eq!(app.mode, AppMode::Buy);
        assert_eq!(app.quantity_input, "1");

        app.handle_key(KeyCode::Backspace);
        type_keys(&mut app, "5x");
        assert_eq!(app.quantity_input, "5");
        app.handle_key(KeyCode::Enter);

        assert_eq!(app.mode, AppMode::Normal);
        assert_eq!(app.session.balance(), 940.0);
        assert_eq!(app.session.ledger().holding("A"), 5);
        assert!(matches!(app.status, Some(Status::Success(_))));
    }

    #[test]
    fn test_buy_with_insufficient_funds() {
        let mut app = app("Week,A\nW1,10\nW2,12\n");
        app.handle_key(KeyCode::Enter);
        app.handle_key(KeyCode::Backspace);
        type_keys(&mut app, "100");
        app.handle_key(KeyCode::Enter);

        assert_eq!(app.mode, AppMode::Normal);
        assert_eq!(app.session.balance(), STARTING_BALANCE);
        assert_eq!(app.session.ledger().holding("A"), 0);
        assert!(matches!(&app.status, Some(Status::Failure(m)) if m.starts_with("Insufficient funds")));
    }

    #[test]
    fn test_buy_with_empty_quantity_keeps_dialog_open() {
        let mut app = app("Week,A\nW1,10\n");
        app.handle_key(KeyCode::Char('b'));
        app.handle_key(KeyCode::Backspace);
        app.handle_key(KeyCode::Enter);

        assert_eq!(app.mode, AppMode::Buy);
        assert_eq!(
            app.status,
            Some(Status::Failure("Quantity is required".to_string()))
        );
        app.handle_key(KeyCode::Esc);
        assert_eq!(app.mode, AppMode::Normal);
        assert!(!app.should_quit);
    }

    #[test]
    fn test_failed_reload_blocks_dashboard() {
        let mut app = app("Week,A\nW1,10\n");
        app.handle_key(KeyCode::Char('r'));
        assert!(app.load_error.is_some());

        app.handle_key(KeyCode::Char('b'));
        assert_eq!(app.mode, AppMode::Normal);

        let screen = render(&app);
        assert!(screen.contains("Price data unavailable"));
        assert!(!screen.contains("Market Summary"));

        app.handle_key(KeyCode::Char('q'));
        assert!(app.should_quit);
    }

    #[test]
    fn test_render_market_tab() {
        let mut app = app("Week,Falcons,Eagles\nW1,10,20\nW2,12,19\n");
        app.session.execute_purchase("Falcons", 3).unwrap();
        let screen = render(&app);
        assert!(screen.contains("Market Summary"));
        assert!(screen.contains("Price History | W2 · Falcons · 12.00"));
        assert!(screen.contains("+2.00"));
        assert!(screen.contains("Falcons: 3 shares"));
    }

    #[test]
    fn test_summary_height_saturates() {
        assert_eq!(summary_height(0), 2);
        assert_eq!(summary_height(4), 2 * CARD_HEIGHT + 2);
        assert_eq!(summary_height(3 * 16_384), u16::MAX);
        assert_eq!(summary_height(usize::MAX), u16::MAX);
    }

    #[test]
    fn test_render_market_tab_with_many_groups() {
        let groups: Vec<String> = (0..120).map(|i| format!("G{i}")).collect();
        let prices = vec!["1"; groups.len()].join(",");
        let data = format!("Week,{}\nW1,{prices}\nW2,{prices}\n", groups.join(","));
        let app = app(&data);
        let screen = render(&app);
        assert!(screen.contains("Market Summary"));
        assert!(screen.contains("G0"));
    }

    #[test]
    fn test_render_portfolio_tab_and_buy_dialog() {
        let mut app = app("Week,A,B\nW1,10,20\n");
        app.handle_key(KeyCode::Char('2'));
        let screen = render(&app);
        assert!(screen.contains("Cash"));
        assert!(screen.contains("TOTAL"));
        assert!(screen.contains("1,000.00 SAR"));

        app.handle_key(KeyCode::Char('b'));
        let screen = render(&app);
        assert!(screen.contains("Buy Shares"));
        assert!(screen.contains("Remaining 990.00 SAR"));
    }
}
