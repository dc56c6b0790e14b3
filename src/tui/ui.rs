//! UI rendering for the emulator.

use super::app::EmulatorApp;
use crate::cpu::memory::{SCREEN_HEIGHT, SCREEN_WIDTH};
use ratatui::{
    prelude::*,
    style::{Color, Modifier, Style},
    widgets::{Block, Borders, List, ListItem, Paragraph},
};

/// Main draw function.
pub fn draw(frame: &mut Frame, app: &EmulatorApp) {
    if !app.debug {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(SCREEN_HEIGHT as u16 / 2 + 2),
                Constraint::Length(3),
                Constraint::Min(0),
            ])
            .split(frame.area());

        draw_screen(frame, chunks[0], app);
        draw_status(frame, chunks[1], app);
        return;
    }

    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Length(SCREEN_WIDTH as u16 + 2),
            Constraint::Min(30),
        ])
        .split(frame.area());

    // Left side: screen, registers and status
    let left_chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(SCREEN_HEIGHT as u16 / 2 + 2),
            Constraint::Length(7),
            Constraint::Length(3),
            Constraint::Min(4),
        ])
        .split(chunks[0]);

    draw_screen(frame, left_chunks[0], app);
    draw_registers(frame, left_chunks[1], app);
    draw_status(frame, left_chunks[2], app);
    draw_help(frame, left_chunks[3]);

    // Right side: disassembly and trace
    let right_chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
        .split(chunks[1]);

    draw_disassembly(frame, right_chunks[0], app);
    draw_trace(frame, right_chunks[1], app);
}

/// Two pixel rows per terminal row using half blocks.
fn screen_lines(frame: &[u8]) -> Vec<Line<'static>> {
    let lit = |x: usize, y: usize| {
        let bit = y * SCREEN_WIDTH + x;
        frame.get(bit / 8).map_or(false, |b| b & (0x80 >> (bit % 8)) != 0)
    };

    (0..SCREEN_HEIGHT / 2)
        .map(|row| {
            let text: String = (0..SCREEN_WIDTH)
                .map(|x| match (lit(x, row * 2), lit(x, row * 2 + 1)) {
                    (true, true) => '█',
                    (true, false) => '▀',
                    (false, true) => '▄',
                    (false, false) => ' ',
                })
                .collect();
            Line::from(text)
        })
        .collect()
}

fn draw_screen(frame: &mut Frame, area: Rect, app: &EmulatorApp) {
    let screen = Paragraph::new(screen_lines(&app.screen.frame))
        .style(Style::default().fg(Color::Green))
        .block(Block::default()
            .title(" CHIP-8 ")
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Cyan)));

    frame.render_widget(screen, area);
}

/// Draw register state.
fn draw_registers(frame: &mut Frame, area: Rect, app: &EmulatorApp) {
    let regs = &app.cpu.regs;

    let row = |range: std::ops::Range<usize>| {
        let spans: Vec<Span> = range
            .map(|r| {
                let style = if regs.v[r] != 0 {
                    Style::default().fg(Color::White)
                } else {
                    Style::default().fg(Color::DarkGray)
                };
                Span::styled(format!("V{:X}={:02X} ", r, regs.v[r]), style)
            })
            .collect();
        Line::from(spans)
    };

    let content = vec![
        row(0..8),
        row(8..16),
        Line::from(vec![
            Span::raw("PC: "),
            Span::styled(format!("{:03X}", regs.pc), Style::default().fg(Color::Yellow)),
            Span::raw("  I: "),
            Span::styled(format!("{:03X}", regs.i), Style::default().fg(Color::White)),
            Span::raw(format!("  DT: {:02X}  ST: {:02X}", regs.dt, regs.st)),
            Span::raw(format!("  SP: {}", app.cpu.stack().len())),
        ]),
        Line::from(vec![
            Span::raw("Cycles: "),
            Span::styled(format!("{}", app.cpu.cycles), Style::default().fg(Color::Cyan)),
            Span::raw("   State: "),
            Span::styled(format!("{:?}", app.cpu.state),
                if app.cpu.is_running() {
                    Style::default().fg(Color::Green)
                } else {
                    Style::default().fg(Color::Red)
                }),
        ]),
    ];

    let paragraph = Paragraph::new(content)
        .block(Block::default()
            .title(" Registers ")
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Green)));

    frame.render_widget(paragraph, area);
}

/// Draw disassembly around PC.
fn draw_disassembly(frame: &mut Frame, area: Rect, app: &EmulatorApp) {
    let disasm = app.get_disassembly((area.height as usize).saturating_sub(2));

    let items: Vec<ListItem> = disasm
        .iter()
        .map(|(addr, instr, is_current)| {
            let prefix = if *is_current { "▶ " } else { "  " };
            let bp = if app.breakpoints.contains(addr) { "●" } else { " " };
            let text = format!("{}{:03X}: {}", prefix, addr, instr);

            let style = if *is_current {
                Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)
            } else if app.breakpoints.contains(addr) {
                Style::default().fg(Color::Red)
            } else {
                Style::default()
            };

            ListItem::new(format!("{} {}", bp, text)).style(style)
        })
        .collect();

    let list = List::new(items)
        .block(Block::default()
            .title(" Disassembly ")
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Cyan)));

    frame.render_widget(list, area);
}

/// Most recent instructions, newest last.
fn draw_trace(frame: &mut Frame, area: Rect, app: &EmulatorApp) {
    let visible = (area.height as usize).saturating_sub(2);
    let skip = app.trace.history.len().saturating_sub(visible);

    let items: Vec<ListItem> = app
        .trace
        .history
        .iter()
        .skip(skip)
        .map(|line| ListItem::new(line.clone()))
        .collect();

    let list = List::new(items)
        .block(Block::default()
            .title(" Trace ")
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Magenta)));

    frame.render_widget(list, area);
}

/// Draw status bar.
fn draw_status(frame: &mut Frame, area: Rect, app: &EmulatorApp) {
    let status = Paragraph::new(app.status.clone())
        .style(Style::default().fg(Color::White))
        .block(Block::default()
            .title(" Status ")
            .borders(Borders::ALL));

    frame.render_widget(status, area);
}

/// Draw help panel.
fn draw_help(frame: &mut Frame, area: Rect) {
    let help = Paragraph::new(vec![
        Line::from("Space: Run/Pause  n: Step  b: Breakpoint"),
        Line::from("Backspace: Reset  Esc: Quit"),
        Line::from("Keypad: 1234 qwer asdf zxcv"),
    ])
    .style(Style::default().fg(Color::DarkGray))
    .block(Block::default()
        .title(" Help ")
        .borders(Borders::ALL));

    frame.render_widget(help, area);
}
