use crate::compressors::lzma::codecs::{
    length_codec::{MATCH_LEN_MAX, MATCH_LEN_MIN},
    lzma_stream_codec::{
        prices::{AnyRepPrice, EncoderPriceCalc},
        state::{State, REPS},
    },
    range_codec::RangeEncPrice,
};

use super::{
    match_finding::{Match, MatchFinder},
    EncodeInstruction, LZMAEncoderInput, LZMAInstructionPicker, OPTS,
};

const MATCH_LEN_MIN_U32: u32 = MATCH_LEN_MIN as u32;

/// Price-optimal parser.
///
/// Starting at the current position it builds a graph of price nodes, one per byte ahead.
/// Each node holds the cheapest known way of reaching it: the previous node, the
/// instruction that leads from there, and the total price. Nodes are visited in order, and
/// every instruction that can start at a node (literal, short rep, long reps, normal
/// matches, literal followed by rep0) relaxes the nodes it ends at. The graph grows as
/// longer instructions are found, up to [`OPTS`] bytes ahead.
///
/// Once the walk stops, the cheapest path back to the start is turned into a stack of
/// instructions that the following calls hand out one by one.
pub struct LZMANormalInstructionPicker {
    nice_len: u32,

    node_graph: Vec<PriceNode>,
    /// Index of the last node that has been reached so far.
    opt_end: usize,

    matches: Vec<Match>,
    instruction_cache_stack: Vec<EncodeInstruction>,
}

impl LZMANormalInstructionPicker {
    pub fn new(nice_len: u32) -> Self {
        Self {
            nice_len,

            node_graph: vec![PriceNode::none(); OPTS as usize],
            opt_end: 0,

            matches: Vec::new(),
            instruction_cache_stack: Vec::new(),
        }
    }

    /// Reaching further ahead than before resets the nodes in between.
    fn extend_graph(&mut self, end: usize) {
        while self.opt_end < end {
            self.opt_end += 1;
            self.node_graph[self.opt_end] = PriceNode::none();
        }
    }

    /// Relax node `index` with a path from `prev`.
    #[inline(always)]
    fn offer(&mut self, index: usize, price: RangeEncPrice, prev: usize, instruction: NodeInstruction) {
        let node = &mut self.node_graph[index];
        if price < node.price {
            *node = PriceNode {
                instruction,
                prev,
                state: State::new(),
                price,
            };
        }
    }

    /// Same as [`Self::offer`], except that ties go to the new path.
    #[inline(always)]
    fn offer_or_tie(&mut self, index: usize, price: RangeEncPrice, prev: usize, instruction: NodeInstruction) {
        let node = &mut self.node_graph[index];
        if price <= node.price {
            *node = PriceNode {
                instruction,
                prev,
                state: State::new(),
                price,
            };
        }
    }

    /// The lengths of the rep matches at the head, 0 if shorter than 2 bytes.
    fn get_rep_lens(input: &LZMAEncoderInput<impl MatchFinder>, state: &State, limit: u32) -> [u32; REPS] {
        state.reps().map(|rep| {
            let len = input.buffer().get_match_length(0, rep, limit);
            if len < MATCH_LEN_MIN_U32 {
                0
            } else {
                len
            }
        })
    }

    /// Prices the first byte ahead: literal, short rep, and literal followed by rep0.
    fn try_one_byte_opts(
        &mut self,
        input: &LZMAEncoderInput<impl MatchFinder>,
        price_calc: &EncoderPriceCalc,
        cur: usize,
        pos: u64,
        avail_full: u32,
        any_rep_price: AnyRepPrice,
    ) {
        let node = self.node_graph[cur];
        let buffer = input.buffer();

        let cur_byte = buffer.get_byte(0);
        let prev_byte = buffer.get_byte(-1);
        let match_byte = buffer.get_byte(-(node.state.get_rep(0) as i32) - 1);

        let literal_price = node.price
            + price_calc.get_literal_price(cur_byte, match_byte, prev_byte, pos, &node.state);
        self.offer(cur + 1, literal_price, cur, NodeInstruction::Literal);

        if match_byte == cur_byte {
            let short_rep_price = any_rep_price.get_short_rep_price();
            self.offer_or_tie(cur + 1, short_rep_price, cur, NodeInstruction::ShortRep);
            return;
        }

        // Literal then rep0
        if avail_full <= MATCH_LEN_MIN_U32 {
            return;
        }

        let len_limit = self.nice_len.min(avail_full - 1);
        let len = buffer.get_match_length_at(1, 0, node.state.get_rep(0), len_limit);
        if len < MATCH_LEN_MIN_U32 {
            return;
        }

        let mut next_state = node.state;
        next_state.update_literal();
        let next_pos_state = price_calc.pos_state(pos + 1);
        let price =
            literal_price + price_calc.get_long_rep_and_len_price(0, len, &next_state, next_pos_state);

        let index = cur + 1 + len as usize;
        self.extend_graph(index);
        self.offer(index, price, cur, NodeInstruction::LiteralThenRep0 { len });
    }

    /// Prices every length of every rep match. Returns the shortest normal match length
    /// worth trying, one past the rep0 length.
    fn try_reps(
        &mut self,
        input: &LZMAEncoderInput<impl MatchFinder>,
        cur: usize,
        len_limit: u32,
        any_rep_price: AnyRepPrice,
    ) -> u32 {
        let state = self.node_graph[cur].state;
        let rep_lens = Self::get_rep_lens(input, &state, len_limit);
        let mut start_len = MATCH_LEN_MIN_U32;

        for (rep_index, &rep_len) in rep_lens.iter().enumerate() {
            if rep_len == 0 {
                continue;
            }

            self.extend_graph(cur + rep_len as usize);
            let rep_price = any_rep_price.get_long_rep_price(rep_index);

            for len in MATCH_LEN_MIN_U32..=rep_len {
                let price = rep_price.get_price_with_len(len);
                self.offer(cur + len as usize, price, cur, NodeInstruction::Rep { rep_index, len });
            }

            if rep_index == 0 {
                start_len = rep_len + 1;
            }
        }

        start_len
    }

    /// Prices the normal matches in `self.matches` from `start_len` upwards, each length
    /// with the closest match that reaches it.
    fn try_matches(
        &mut self,
        price_calc: &EncoderPriceCalc,
        cur: usize,
        pos: u64,
        start_len: u32,
        len_limit: u32,
    ) {
        let longest = match self.matches.last() {
            Some(m) => m.len.min(len_limit),
            None => return,
        };
        if longest < start_len {
            return;
        }

        let state = self.node_graph[cur].state;
        let normal_match_price = price_calc
            .get_any_match_price(&state, price_calc.pos_state(pos))
            .with_base(self.node_graph[cur].price)
            .get_normal_match_price();

        self.extend_graph(cur + longest as usize);

        let mut match_index = 0;
        for len in start_len..=longest {
            while self.matches[match_index].len < len {
                match_index += 1;
            }

            let distance = self.matches[match_index].distance;
            let price = normal_match_price.get_price_with_dist_len(distance, len);
            self.offer(
                cur + len as usize,
                price,
                cur,
                NodeInstruction::Match(Match { distance, len }),
            );
        }
    }

    /// Work out the state at node `cur` from the node before it.
    fn update_node_state(&mut self, cur: usize) {
        let node = self.node_graph[cur];
        let mut state = self.node_graph[node.prev].state;

        match node.instruction {
            NodeInstruction::None => {}
            NodeInstruction::Literal => state.update_literal(),
            NodeInstruction::ShortRep => state.update_short_rep(),
            NodeInstruction::Rep { rep_index, .. } => {
                state.update_long_rep(rep_index);
            }
            NodeInstruction::Match(match_) => state.update_match(match_.distance),
            NodeInstruction::LiteralThenRep0 { .. } => {
                state.update_literal();
                state.update_long_rep(0);
            }
        }

        self.node_graph[cur].state = state;
    }

    /// Push the path ending at `end` onto the instruction stack, last instruction first.
    fn convert_graph_into_instructions(&mut self, end: usize) {
        let mut pos = end;

        while pos != 0 {
            let node = self.node_graph[pos];

            match node.instruction {
                NodeInstruction::None => {
                    debug_assert!(false, "unreachable node {} on the price path", pos);
                    break;
                }
                NodeInstruction::Literal => {
                    self.instruction_cache_stack.push(EncodeInstruction::Literal);
                }
                NodeInstruction::ShortRep => {
                    self.instruction_cache_stack.push(EncodeInstruction::ShortRep);
                }
                NodeInstruction::Rep { rep_index, len } => {
                    self.instruction_cache_stack
                        .push(EncodeInstruction::Rep { rep_index, len });
                }
                NodeInstruction::Match(match_) => {
                    self.instruction_cache_stack.push(EncodeInstruction::Match(match_));
                }
                NodeInstruction::LiteralThenRep0 { len } => {
                    // Reversed, as it's a stack
                    self.instruction_cache_stack
                        .push(EncodeInstruction::Rep { rep_index: 0, len });
                    self.instruction_cache_stack.push(EncodeInstruction::Literal);
                }
            }

            pos = node.prev;
        }
    }

    /// Plan from the head, which sits at block position `position`. Returns the first
    /// instruction, the rest are left on the stack.
    fn plan(
        &mut self,
        input: &mut LZMAEncoderInput<impl MatchFinder>,
        price_calc: &EncoderPriceCalc,
        state: &State,
        position: u64,
    ) -> EncodeInstruction {
        let avail = input.forward_bytes().min(MATCH_LEN_MAX as u32);
        if avail < MATCH_LEN_MIN_U32 {
            return EncodeInstruction::Literal;
        }

        let rep_lens = Self::get_rep_lens(input, state, avail);
        let (best_rep, &best_rep_len) = rep_lens
            .iter()
            .enumerate()
            .rev()
            .max_by_key(|&(_, &len)| len)
            .unwrap_or((0, &0));

        if best_rep_len >= self.nice_len {
            return EncodeInstruction::Rep {
                rep_index: best_rep,
                len: best_rep_len,
            };
        }

        self.matches.clear();
        self.matches.extend_from_slice(input.calc_matches());

        let main_len = match self.matches.last() {
            Some(&main) if main.len >= self.nice_len => return EncodeInstruction::Match(main),
            Some(main) => main.len,
            None => 0,
        };

        let buffer = input.buffer();
        let cur_byte = buffer.get_byte(0);
        let match_byte = buffer.get_byte(-(state.get_rep(0) as i32) - 1);

        if main_len < MATCH_LEN_MIN_U32 && cur_byte != match_byte && best_rep_len < MATCH_LEN_MIN_U32 {
            return EncodeInstruction::Literal;
        }

        self.node_graph[0] = PriceNode::initial(*state);
        self.opt_end = 0;
        self.extend_graph(main_len.max(best_rep_len).max(1) as usize);

        let pos_state = price_calc.pos_state(position);
        let any_rep_price = price_calc
            .get_any_match_price(state, pos_state)
            .get_any_rep_price();

        let prev_byte = buffer.get_byte(-1);
        let literal_price = price_calc.get_literal_price(cur_byte, match_byte, prev_byte, position, state);
        self.offer(1, literal_price, 0, NodeInstruction::Literal);
        if match_byte == cur_byte {
            self.offer_or_tie(1, any_rep_price.get_short_rep_price(), 0, NodeInstruction::ShortRep);
        }

        if self.opt_end < MATCH_LEN_MIN {
            return match self.node_graph[1].instruction {
                NodeInstruction::ShortRep => EncodeInstruction::ShortRep,
                _ => EncodeInstruction::Literal,
            };
        }

        let start_len = self.try_reps(input, 0, avail, any_rep_price);
        self.try_matches(price_calc, 0, position, start_len, avail);

        let mut cur = 0;
        loop {
            cur += 1;
            if cur >= self.opt_end {
                break;
            }

            input.increment_pos();
            self.matches.clear();
            self.matches.extend_from_slice(input.calc_matches());

            if self.matches.last().map_or(false, |m| m.len >= self.nice_len) {
                // Plan up to here, the long match gets picked up by the next call
                break;
            }

            self.update_node_state(cur);

            let pos = position + cur as u64;
            let avail_full = input.forward_bytes().min(OPTS - 1 - cur as u32);
            let len_limit = avail_full.min(self.nice_len);

            let node = self.node_graph[cur];
            let any_match_price = price_calc
                .get_any_match_price(&node.state, price_calc.pos_state(pos))
                .with_base(node.price);
            let any_rep_price = any_match_price.get_any_rep_price();

            self.try_one_byte_opts(input, price_calc, cur, pos, avail_full, any_rep_price);

            if len_limit >= MATCH_LEN_MIN_U32 {
                let start_len = self.try_reps(input, cur, len_limit, any_rep_price);
                self.try_matches(price_calc, cur, pos, start_len, len_limit);
            }
        }

        self.convert_graph_into_instructions(cur);
        self.instruction_cache_stack
            .pop()
            .unwrap_or(EncodeInstruction::Literal)
    }
}

impl LZMAInstructionPicker for LZMANormalInstructionPicker {
    fn needs_price_update(&self) -> bool {
        self.instruction_cache_stack.is_empty()
    }

    fn get_next_symbol(
        &mut self,
        input: &mut LZMAEncoderInput<impl MatchFinder>,
        price_calc: &EncoderPriceCalc,
        state: &State,
        position: u64,
    ) -> EncodeInstruction {
        if let Some(instruction) = self.instruction_cache_stack.pop() {
            return instruction;
        }

        self.plan(input, price_calc, state, position)
    }
}

#[derive(Debug, Clone, Copy)]
enum NodeInstruction {
    None,
    Literal,
    ShortRep,
    Rep { rep_index: usize, len: u32 },
    Match(Match),
    /// A literal followed by a rep0 match of `len` bytes.
    LiteralThenRep0 { len: u32 },
}

#[derive(Debug, Clone, Copy)]
struct PriceNode {
    instruction: NodeInstruction,
    prev: usize,
    /// The state after the instruction. Only valid once the node has been visited.
    state: State,
    price: RangeEncPrice,
}

impl PriceNode {
    fn none() -> Self {
        Self {
            instruction: NodeInstruction::None,
            prev: 0,
            state: State::new(),
            price: RangeEncPrice::infinity(),
        }
    }

    fn initial(state: State) -> Self {
        Self {
            instruction: NodeInstruction::None,
            prev: 0,
            state,
            price: RangeEncPrice::zero(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::match_finding::bt4::BT4MatchFinder;
    use super::*;
    use crate::compressors::lzma::codecs::{
        header_codec::LzmaProperties, lzma_stream_codec::LZMACodecEncoder,
        range_codec::RangeEncoder,
    };

    fn pick_at(data: &[u8], position: u32, state: &State) -> (EncodeInstruction, u64) {
        let mut input = LZMAEncoderInput::new(BT4MatchFinder::new(1024, 32, 32), 1024);
        input.append_data(data);
        input.skip(position);

        let mut codec = LZMACodecEncoder::new(&LzmaProperties::default(), 32, 1024);
        codec.update_prices();

        let mut picker = LZMANormalInstructionPicker::new(32);
        let instruction =
            picker.get_next_symbol(&mut input, &codec.price_calc(), state, position as u64);
        (instruction, input.pos())
    }

    /// Drive the picker over all of `data` the way the encoder does, checking that every
    /// instruction reproduces the data.
    fn plan_everything(data: &[u8], nice_len: u32) -> Vec<EncodeInstruction> {
        let dict_size = 1 << 16;
        let finder = BT4MatchFinder::new(dict_size, nice_len, 16 + nice_len / 2);
        let mut input = LZMAEncoderInput::new(finder, dict_size);
        input.append_data(data);

        let mut codec = LZMACodecEncoder::new(&LzmaProperties::default(), nice_len, dict_size);
        let mut picker = LZMANormalInstructionPicker::new(nice_len);
        let mut rc = RangeEncoder::new(Vec::new());
        let mut instructions = Vec::new();
        let mut position = 0;

        while position < data.len() {
            let instruction = if position == 0 {
                EncodeInstruction::Literal
            } else {
                if picker.needs_price_update() {
                    codec.update_prices();
                }
                picker.get_next_symbol(&mut input, &codec.price_calc(), codec.state(), position as u64)
            };

            let len = instruction.length() as usize;
            assert!(position + len <= data.len());
            let copied_from = match instruction {
                EncodeInstruction::Literal => None,
                EncodeInstruction::ShortRep => Some(codec.state().get_rep(0)),
                EncodeInstruction::Rep { rep_index, .. } => Some(codec.state().get_rep(rep_index)),
                EncodeInstruction::Match(m) => Some(m.distance),
            };
            if let Some(distance) = copied_from {
                let start = position - distance as usize - 1;
                assert_eq!(
                    data[start..start + len],
                    data[position..position + len],
                    "{:?} at {}",
                    instruction,
                    position
                );
            }

            codec
                .encode_instruction(&mut rc, &input, instruction, position as u64, position as u64)
                .unwrap();
            instructions.push(instruction);

            position += len;
            if input.pos() < position as u64 {
                input.skip((position as u64 - input.pos()) as u32);
            }
        }

        instructions
    }

    #[test]
    fn test_literal_without_matches() {
        let (instruction, _) = pick_at(b"abcdefgh", 3, &State::new());
        assert_eq!(instruction, EncodeInstruction::Literal);
    }

    #[test]
    fn test_nice_match_is_taken_right_away() {
        let data = b"abc".repeat(30);
        let (instruction, head) = pick_at(&data, 3, &State::new());
        assert_eq!(
            instruction,
            EncodeInstruction::Match(Match {
                distance: 2,
                len: 87
            })
        );
        assert_eq!(head, 3);
    }

    #[test]
    fn test_whole_match_is_cheapest() {
        let (instruction, head) = pick_at(b"abcdefgh12abcdefgh", 10, &State::new());
        assert_eq!(
            instruction,
            EncodeInstruction::Match(Match {
                distance: 9,
                len: 8
            })
        );
        // Planned up to the last byte before the end of the match
        assert_eq!(head, 17);
    }

    #[test]
    fn test_rep_is_preferred_over_the_same_match() {
        let mut state = State::new();
        state.update_match(9);

        let (instruction, _) = pick_at(b"abcdefgh12abcdefgh", 10, &state);
        assert_eq!(
            instruction,
            EncodeInstruction::Rep {
                rep_index: 0,
                len: 8
            }
        );
    }

    #[test]
    fn test_short_rep() {
        let (instruction, _) = pick_at(b"abccd", 3, &State::new());
        assert_eq!(instruction, EncodeInstruction::ShortRep);
    }

    #[test]
    fn test_plans_reproduce_the_data() {
        let mut data = Vec::new();
        for i in 0..400u32 {
            data.extend_from_slice(format!("line {} of {}\n", i % 37, i % 5).as_bytes());
        }

        let instructions = plan_everything(&data, 64);
        assert!(instructions.len() < data.len() / 4);
        assert!(instructions
            .iter()
            .any(|i| matches!(i, EncodeInstruction::Rep { .. })));
    }

    #[test]
    fn test_plans_with_short_nice_len() {
        let mut data = b"abracadabra ".repeat(50);
        data.extend((0..=255u8).cycle().take(3000));

        let instructions = plan_everything(&data, 5);
        assert!(instructions.len() < data.len());
    }
}
